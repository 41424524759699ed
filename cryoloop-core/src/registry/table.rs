//! Registration table
//!
//! Insertion-ordered components and their exposed states. Every
//! registration, component or state, consumes one ordinal; a state's
//! ordinal is its durable identifier and names its bank files. Registration
//! order must therefore stay the same across firmware revisions, or a
//! record will be read back as the history of a different state.
//!
//! The table is append-only and is sealed when the scheduler starts.

use alloc::boxed::Box;
use core::any::TypeId;
use core::fmt;

use heapless::Vec;

use super::component::{Component, DynComponent};
use crate::persist::RecordSlot;
use crate::state::exposed::DynState;
use crate::state::{ExposedState, StateKind, Value, ValueType};

/// Maximum components
pub const MAX_COMPONENTS: usize = 16;

/// Maximum exposed states across all components
pub const MAX_STATES: usize = 64;

/// Position of a component in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComponentId(pub u8);

/// Durable identifier of an exposed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateId(pub u16);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Scheduler already started
    Sealed,
    /// Table capacity reached
    Full,
    /// State registered before any component
    NoComponent,
    /// State bound to a different type than the last component
    OwnerMismatch,
}

/// Introspection record of one exposed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateInfo {
    pub id: StateId,
    pub name: &'static str,
    pub kind: StateKind,
    pub value_type: ValueType,
    pub owner: ComponentId,
}

/// A registered state with its backing record
pub(crate) struct StateEntry {
    pub(crate) id: StateId,
    pub(crate) owner: usize,
    pub(crate) state: Box<dyn DynState>,
    pub(crate) record: Option<RecordSlot>,
}

impl StateEntry {
    pub(crate) fn info(&self) -> StateInfo {
        StateInfo {
            id: self.id,
            name: self.state.name(),
            kind: self.state.kind(),
            value_type: self.state.value_type(),
            owner: ComponentId(self.owner as u8),
        }
    }
}

/// Component and state registry
pub struct Registry {
    pub(crate) components: Vec<Box<dyn DynComponent>, MAX_COMPONENTS>,
    pub(crate) states: Vec<StateEntry, MAX_STATES>,
    /// Registrations so far, components and states alike
    registrations: u16,
    sealed: bool,
    max_entries: u16,
    min_write_interval_ms: u32,
}

impl Registry {
    /// Create an empty registry
    ///
    /// Records created for persisted states use the given bank size and
    /// write interval.
    pub fn new(max_entries: u16, min_write_interval_ms: u32) -> Self {
        Self {
            components: Vec::new(),
            states: Vec::new(),
            registrations: 0,
            sealed: false,
            max_entries,
            min_write_interval_ms,
        }
    }

    /// Append a component
    pub fn register_component<C: Component>(
        &mut self,
        component: C,
    ) -> Result<ComponentId, RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        let id = ComponentId(self.components.len() as u8);
        self.components
            .push(Box::new(component))
            .map_err(|_| RegistryError::Full)?;
        self.registrations += 1;
        Ok(id)
    }

    /// Append a state owned by the most recently registered component
    pub fn register_state<C: Component>(
        &mut self,
        state: ExposedState<C>,
    ) -> Result<StateId, RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        let owner = self
            .components
            .len()
            .checked_sub(1)
            .ok_or(RegistryError::NoComponent)?;
        let component = &self.components[owner];
        if component.owner_type() != TypeId::of::<C>() {
            return Err(RegistryError::OwnerMismatch);
        }
        if self.states.is_full() {
            return Err(RegistryError::Full);
        }

        let id = StateId(self.registrations);
        let record = if state.kind().is_persisted() {
            state
                .read(component.as_any())
                .or_else(|| Value::zero(state.value_type()))
                .map(|default| {
                    RecordSlot::new(id.0, default, self.max_entries, self.min_write_interval_ms)
                })
        } else {
            None
        };

        let entry = StateEntry {
            id,
            owner,
            state: Box::new(state),
            record,
        };
        if self.states.push(entry).is_err() {
            return Err(RegistryError::Full);
        }
        self.registrations += 1;
        Ok(id)
    }

    /// Forbid further registration
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Check if registration is closed
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Registrations so far
    pub fn registrations(&self) -> u16 {
        self.registrations
    }

    /// Number of components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Components in registration order
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &'static str)> + '_ {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i as u8), c.name()))
    }

    /// States in registration order
    pub fn states(&self) -> impl Iterator<Item = StateInfo> + '_ {
        self.states.iter().map(StateEntry::info)
    }

    /// Table position of a state
    pub(crate) fn position(&self, id: StateId) -> Option<usize> {
        self.states.iter().position(|e| e.id == id)
    }

    /// Table position of the first state with a given name
    pub(crate) fn position_by_name(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|e| e.state.name() == name)
    }
}
