//! Out-of-band trap path
//!
//! A hardware fault or a hung `update` strikes while the runtime is locked,
//! so the trap path cannot go through the runtime. A [`TrapLine`] holds
//! what escalation needs on its own: the operation watchdog and a separate
//! handle on the fault medium. Fault handlers and the timer interrupt call
//! into it directly; the runtime routes its own traps through it too, so
//! each fault escalates the markers once.

use core::cell::RefCell;

use cryoloop_hal::FileStorage;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::context::RestartReason;
use super::fault::{self, FaultStage};
use super::watchdog::Watchdog;

/// Trap path reachable without the runtime lock
pub trait Trap {
    /// Watchdog shared with the runtime
    fn watchdog(&self) -> &Watchdog;

    /// Escalate the fault markers and return the restart to perform
    ///
    /// Only the first trap writes a marker; later calls return the same
    /// reason.
    fn trap(&self) -> RestartReason;

    /// Restart already decided by an earlier trap
    fn pending(&self) -> Option<RestartReason>;

    /// Check the watchdog from the timer context
    ///
    /// Takes the trap once the deadline has passed. Returns the pending
    /// restart, if any.
    fn poll(&self, now_ms: u64) -> Option<RestartReason> {
        if self.watchdog().check(now_ms) {
            error!("Watchdog expired at {} ms", now_ms);
            return Some(self.trap());
        }
        self.pending()
    }
}

struct Line<F> {
    medium: F,
    pending: Option<RestartReason>,
}

/// Watchdog and fault medium, usable in a `static`
pub struct TrapLine<M: RawMutex, F: FileStorage> {
    watchdog: Watchdog,
    inner: Mutex<M, RefCell<Line<F>>>,
}

impl<M: RawMutex, F: FileStorage> TrapLine<M, F> {
    /// Create a trap line escalating on `medium`
    ///
    /// `medium` is a handle of its own on the runtime's storage; it is
    /// mounted on first use.
    pub const fn new(medium: F, watchdog_timeout_ms: u64) -> Self {
        Self {
            watchdog: Watchdog::new(watchdog_timeout_ms),
            inner: Mutex::new(RefCell::new(Line {
                medium,
                pending: None,
            })),
        }
    }
}

impl<M: RawMutex, F: FileStorage> Trap for TrapLine<M, F> {
    fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    fn trap(&self) -> RestartReason {
        self.inner.lock(|cell| {
            let Ok(mut line) = cell.try_borrow_mut() else {
                // Raised during escalation; the outer trap writes the marker
                return RestartReason::Fatal;
            };
            if let Some(reason) = line.pending {
                return reason;
            }

            let stage = match fault::escalate(&mut line.medium) {
                Ok(stage) => stage,
                Err(e) => {
                    error!("Fault marker not written: {:?}", e);
                    FaultStage::read(&mut line.medium)
                }
            };
            error!("Unrecoverable trap, fault stage {:?}", stage);
            let reason = RestartReason::Trap(stage);
            line.pending = Some(reason);
            reason
        })
    }

    fn pending(&self) -> Option<RestartReason> {
        self.inner
            .lock(|cell| cell.try_borrow().ok().and_then(|line| line.pending))
    }
}
