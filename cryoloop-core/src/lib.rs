//! Board-agnostic runtime core for the cryo controller firmware
//!
//! This crate contains the runtime every hardware-driving component sits
//! on, independent of the board it runs on:
//!
//! - Component/state registry with durable identifiers
//! - Exposed state kinds with type-checked generic access
//! - Dual-bank persistent records on removable storage
//! - Periodic scheduler, watchdog and staged fault escalation
//! - Central error log and runtime configuration

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod persist;
pub mod registry;
pub mod runtime;
pub mod state;

pub use error::{ErrorCode, ErrorLog, Severity};
pub use registry::{Component, StateId};
pub use runtime::{Runtime, TickContext, TickOutcome};
pub use state::{ExposedState, Selection, StateHandle};
