//! Persistent record store
//!
//! Wear-bounded, power-loss tolerant logging of fixed-size values to the
//! removable medium.

pub mod codec;
pub mod record;
pub mod slot;

pub use codec::{Record, MAX_RECORD_SIZE};
pub use record::{Bank, FileName, InitReport, PersistentRecord, WriteGate, WriteOutcome};
pub use slot::RecordSlot;
