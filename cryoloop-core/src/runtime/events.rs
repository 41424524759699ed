//! Events that drive the runtime phase machine

use super::fault::FaultStage;

/// Events that can trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Stores initialized and states hydrated
    BootComplete,
    /// Unrecoverable trap (hardware fault or watchdog expiry)
    Trap,
    /// Fault marker written; restart pending
    EscalationDone(FaultStage),
    /// Fatal error recorded; controlled restart pending
    FatalError,
}

impl Event {
    /// Check if this event comes from the fault path
    pub fn is_fault_event(&self) -> bool {
        matches!(self, Event::Trap | Event::EscalationDone(_))
    }
}
