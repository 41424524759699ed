//! Runtime phase machine
//!
//! `Booting → Running → (Faulting) → Restarting`. A restart is carried out
//! by the platform; the next boot starts again from `Booting`.

use super::events::Event;

/// Runtime phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Registration open, stores not yet initialized
    Booting,
    /// Ticking
    Running,
    /// Unrecoverable trap taken; escalating fault markers
    Faulting,
    /// Waiting for the platform to reset the device
    Restarting,
}

impl Phase {
    /// Check if ticks run component updates
    pub fn is_ticking(&self) -> bool {
        matches!(self, Phase::Running)
    }

    /// Check if the device is on its way down
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Faulting | Phase::Restarting)
    }

    /// Process an event and return the next phase
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use Phase::*;

        match (self, event) {
            (Booting, BootComplete) => Running,

            // A trap can arrive before boot has finished
            (Booting | Running, Trap) => Faulting,
            (Faulting, EscalationDone(_)) => Restarting,

            (Booting | Running, FatalError) => Restarting,

            // Default: stay in current phase
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FaultStage;

    #[test]
    fn test_boot_to_running() {
        assert_eq!(Phase::Booting.transition(Event::BootComplete), Phase::Running);
        assert!(Phase::Running.is_ticking());
    }

    #[test]
    fn test_trap_path() {
        for phase in [Phase::Booting, Phase::Running] {
            let faulting = phase.transition(Event::Trap);
            assert_eq!(faulting, Phase::Faulting);
            let next = faulting.transition(Event::EscalationDone(FaultStage::Stage2));
            assert_eq!(next, Phase::Restarting);
        }
    }

    #[test]
    fn test_fatal_restarts_without_escalation() {
        assert_eq!(Phase::Running.transition(Event::FatalError), Phase::Restarting);
    }

    #[test]
    fn test_restarting_is_final() {
        let events = [
            Event::BootComplete,
            Event::Trap,
            Event::FatalError,
            Event::EscalationDone(FaultStage::Stage3),
        ];
        for event in events {
            assert_eq!(Phase::Restarting.transition(event), Phase::Restarting);
        }
    }

    #[test]
    fn test_ignored_events() {
        assert_eq!(Phase::Running.transition(Event::BootComplete), Phase::Running);
        assert_eq!(Phase::Faulting.transition(Event::Trap), Phase::Faulting);
        assert!(Phase::Faulting.is_terminal());
        assert!(!Phase::Faulting.is_ticking());
    }
}
