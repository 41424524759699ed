//! Per-tick context handed to components

use super::watchdog::Watchdog;
use crate::error::{ErrorCode, ErrorLog, Severity};

/// The current scheduler pass was stopped by a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Halted;

/// What a component sees during its `update`
pub struct TickContext<'a> {
    now_ms: u64,
    cycle_ms: u32,
    tick: u64,
    errors: &'a mut ErrorLog,
    watchdog: &'a Watchdog,
    halted: bool,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(
        now_ms: u64,
        cycle_ms: u32,
        tick: u64,
        errors: &'a mut ErrorLog,
        watchdog: &'a Watchdog,
    ) -> Self {
        Self {
            now_ms,
            cycle_ms,
            tick,
            errors,
            watchdog,
            halted: false,
        }
    }

    /// Runtime clock at the start of this tick (ms)
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Time since the previous tick (ms)
    pub fn cycle_ms(&self) -> u32 {
        self.cycle_ms
    }

    /// Ticks since boot, starting at 1
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Record a failure in the central log
    ///
    /// [`Severity::Halt`] and worse stop the pass: components after this
    /// one are not updated this tick, and `Err(Halted)` is returned so the
    /// caller can bail out with `?`. A [`Severity::Fatal`] report also
    /// makes the runtime request a controlled restart.
    pub fn report(&mut self, message: &'static str, severity: Severity) -> Result<(), Halted> {
        self.errors
            .record(ErrorCode::Component, message, severity, self.now_ms);
        if severity >= Severity::Halt {
            self.halted = true;
            return Err(Halted);
        }
        Ok(())
    }

    /// Check if a report stopped the pass
    pub(crate) fn halted(&self) -> bool {
        self.halted
    }

    /// Arm the watchdog around a bounded operation
    pub fn start_watchdog(&mut self) {
        self.watchdog.start(self.now_ms);
    }

    /// Declare the guarded operation complete
    pub fn stop_watchdog(&mut self) {
        self.watchdog.stop();
    }

    /// Check if the watchdog is armed
    pub fn watchdog_running(&self) -> bool {
        self.watchdog.is_running()
    }
}
