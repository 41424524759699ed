//! Component and state registry

pub mod component;
pub mod table;

pub use component::Component;
pub use table::{
    ComponentId, Registry, RegistryError, StateId, StateInfo, MAX_COMPONENTS, MAX_STATES,
};
