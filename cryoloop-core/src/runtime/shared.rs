//! Runtime behind a lock
//!
//! The tick source and the accessors (console, transport) run in different
//! contexts but touch the same component fields. Both go through one
//! blocking mutex, so an accessor never observes a half-finished tick.
//! Traps and the watchdog check bypass that mutex through the trap line.

use core::cell::RefCell;

use cryoloop_hal::FileStorage;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::context::{BootReport, RestartReason, Runtime, TickOutcome};
use super::trap::Trap;

/// Runtime shared between the tick context and accessors
///
/// Pick `CriticalSectionRawMutex` when accessors run in a different
/// priority level than the tick, `NoopRawMutex` on a single executor.
pub struct SharedRuntime<M: RawMutex, S: FileStorage> {
    inner: Mutex<M, RefCell<Runtime<S>>>,
    line: &'static (dyn Trap + Sync),
}

impl<M: RawMutex, S: FileStorage> SharedRuntime<M, S> {
    /// Wrap a runtime, routing its traps and watchdog through `line`
    pub fn new(runtime: Runtime<S>, line: &'static (dyn Trap + Sync)) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(runtime.with_trap_line(line))),
            line,
        }
    }

    /// Run `f` with exclusive access to the runtime
    ///
    /// # Panics
    /// If called from inside another `lock` on the same runtime.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Runtime<S>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Boot under the lock
    pub fn boot(&self, now_ms: u64) -> BootReport {
        self.lock(|runtime| runtime.boot(now_ms))
    }

    /// Tick under the lock
    pub fn tick(&self, now_ms: u64) -> TickOutcome {
        self.lock(|runtime| runtime.tick(now_ms))
    }

    /// Unrecoverable trap entry point
    ///
    /// Never takes the runtime lock, so fault handlers may call it while a
    /// tick or an accessor holds the runtime.
    pub fn trap(&self) -> RestartReason {
        self.line.trap()
    }

    /// Check the watchdog from the timer context
    ///
    /// Never takes the runtime lock; catches an `update` that does not
    /// return. Returns the restart to perform, if any.
    pub fn poll_watchdog(&self, now_ms: u64) -> Option<RestartReason> {
        self.line.poll(now_ms)
    }

    /// Unwrap the runtime
    pub fn into_inner(self) -> Runtime<S> {
        self.inner.into_inner().into_inner()
    }
}
