//! Record of a tagged value
//!
//! Each persisted exposed state owns one record whose width follows the
//! state's value type. The slot dispatches on that type once, so callers
//! deal in [`Value`]s.

use cryoloop_hal::{FileStorage, StorageError};

use super::record::{InitReport, PersistentRecord, WriteGate, WriteOutcome};
use crate::state::{Value, ValueType};

/// Persistent record for one of the exposed value types
#[derive(Debug, Clone)]
pub enum RecordSlot {
    Double(PersistentRecord<f64>),
    Int(PersistentRecord<i32>),
    Bool(PersistentRecord<bool>),
    Index(PersistentRecord<u16>),
}

impl RecordSlot {
    /// Create the record for a state, seeded with its current value
    pub fn new(id: u16, default: Value, max_entries: u16, min_interval_ms: u32) -> Self {
        match default {
            Value::Double(v) => {
                RecordSlot::Double(PersistentRecord::new(id, v, max_entries, min_interval_ms))
            }
            Value::Int(v) => {
                RecordSlot::Int(PersistentRecord::new(id, v, max_entries, min_interval_ms))
            }
            Value::Bool(v) => {
                RecordSlot::Bool(PersistentRecord::new(id, v, max_entries, min_interval_ms))
            }
            Value::Index(v) => {
                RecordSlot::Index(PersistentRecord::new(id, v, max_entries, min_interval_ms))
            }
        }
    }

    /// Value type stored by this record
    pub fn value_type(&self) -> ValueType {
        match self {
            RecordSlot::Double(_) => ValueType::Double,
            RecordSlot::Int(_) => ValueType::Int,
            RecordSlot::Bool(_) => ValueType::Bool,
            RecordSlot::Index(_) => ValueType::Index,
        }
    }

    /// Validate bank files at boot
    pub fn init<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> InitReport {
        match self {
            RecordSlot::Double(r) => r.init(storage),
            RecordSlot::Int(r) => r.init(storage),
            RecordSlot::Bool(r) => r.init(storage),
            RecordSlot::Index(r) => r.init(storage),
        }
    }

    /// Debounced write
    ///
    /// Returns `None` if the value is not of this record's type.
    pub fn write<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        gate: WriteGate,
        value: Value,
    ) -> Option<WriteOutcome> {
        Some(match (self, value) {
            (RecordSlot::Double(r), Value::Double(v)) => r.write(storage, gate, v),
            (RecordSlot::Int(r), Value::Int(v)) => r.write(storage, gate, v),
            (RecordSlot::Bool(r), Value::Bool(v)) => r.write(storage, gate, v),
            (RecordSlot::Index(r), Value::Index(v)) => r.write(storage, gate, v),
            _ => return None,
        })
    }

    /// Most recently written value
    pub fn read<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> Value {
        match self {
            RecordSlot::Double(r) => Value::Double(r.read(storage)),
            RecordSlot::Int(r) => Value::Int(r.read(storage)),
            RecordSlot::Bool(r) => Value::Bool(r.read(storage)),
            RecordSlot::Index(r) => Value::Index(r.read(storage)),
        }
    }

    /// Value at a logical history position, oldest first
    pub fn get_element<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        index: usize,
    ) -> Option<Value> {
        match self {
            RecordSlot::Double(r) => r.get_element(storage, index).map(Value::Double),
            RecordSlot::Int(r) => r.get_element(storage, index).map(Value::Int),
            RecordSlot::Bool(r) => r.get_element(storage, index).map(Value::Bool),
            RecordSlot::Index(r) => r.get_element(storage, index).map(Value::Index),
        }
    }

    /// Records across both banks
    pub fn entries(&self) -> usize {
        match self {
            RecordSlot::Double(r) => r.entries(),
            RecordSlot::Int(r) => r.entries(),
            RecordSlot::Bool(r) => r.entries(),
            RecordSlot::Index(r) => r.entries(),
        }
    }

    /// Last storage error seen
    pub fn error(&self) -> Option<StorageError> {
        match self {
            RecordSlot::Double(r) => r.error(),
            RecordSlot::Int(r) => r.error(),
            RecordSlot::Bool(r) => r.error(),
            RecordSlot::Index(r) => r.error(),
        }
    }

    /// Clear the error flag
    pub fn clear_error(&mut self) {
        match self {
            RecordSlot::Double(r) => r.clear_error(),
            RecordSlot::Int(r) => r.clear_error(),
            RecordSlot::Bool(r) => r.clear_error(),
            RecordSlot::Index(r) => r.clear_error(),
        }
    }

    /// Flag a storage failure hit on behalf of this record
    pub fn set_error(&mut self, error: StorageError) {
        match self {
            RecordSlot::Double(r) => r.set_error(error),
            RecordSlot::Int(r) => r.set_error(error),
            RecordSlot::Bool(r) => r.set_error(error),
            RecordSlot::Index(r) => r.set_error(error),
        }
    }

    /// Remove both bank files
    pub fn erase<S: FileStorage + ?Sized>(&mut self, storage: &mut S) -> Result<(), StorageError> {
        match self {
            RecordSlot::Double(r) => r.erase(storage),
            RecordSlot::Int(r) => r.erase(storage),
            RecordSlot::Bool(r) => r.erase(storage),
            RecordSlot::Index(r) => r.erase(storage),
        }
    }
}
