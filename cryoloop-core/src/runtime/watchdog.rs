//! Operation watchdog
//!
//! Guards one bounded operation at a time. The watchdog is not fed by
//! ticks: whoever starts it must stop it, or the runtime takes the
//! unrecoverable trap path once the deadline passes.
//!
//! State lives in atomics so a timer interrupt can check the deadline
//! while a tick is still inside a component's `update`.

use portable_atomic::{AtomicU64, Ordering};

/// Start time stored while disarmed
const DISARMED: u64 = u64::MAX;

/// Explicitly started and stopped deadline timer
#[derive(Debug)]
pub struct Watchdog {
    /// Deadline after start (ms)
    timeout_ms: AtomicU64,
    /// Start time while armed (ms), [`DISARMED`] otherwise
    started_at: AtomicU64,
}

impl Watchdog {
    /// Create a disarmed watchdog, usable in a `static`
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms: AtomicU64::new(timeout_ms),
            started_at: AtomicU64::new(DISARMED),
        }
    }

    /// Change the deadline for the next arming
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::Release);
    }

    /// Arm the watchdog, restarting the deadline if already armed
    pub fn start(&self, now_ms: u64) {
        self.started_at
            .store(now_ms.min(DISARMED - 1), Ordering::Release);
    }

    /// Disarm the watchdog
    pub fn stop(&self) {
        self.started_at.store(DISARMED, Ordering::Release);
    }

    /// Check if the watchdog is armed
    pub fn is_running(&self) -> bool {
        self.started_at.load(Ordering::Acquire) != DISARMED
    }

    /// Deadline after start (ms)
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::Acquire)
    }

    /// Check for expiry
    ///
    /// Returns `true` exactly once per arming, when the deadline has
    /// passed; the watchdog disarms itself at that point. With several
    /// checkers racing, only one of them sees `true`.
    pub fn check(&self, now_ms: u64) -> bool {
        let start = self.started_at.load(Ordering::Acquire);
        if start == DISARMED || now_ms.saturating_sub(start) < self.timeout_ms() {
            return false;
        }
        self.started_at
            .compare_exchange(start, DISARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
