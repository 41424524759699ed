//! Power-loss flag
//!
//! Set from the supply-monitor interrupt and nothing else happens there;
//! the persistence layer reads it before touching the medium.

use core::sync::atomic::{AtomicBool, Ordering};

/// Imminent power loss indicator
#[derive(Debug, Default)]
pub struct PowerLossFlag(AtomicBool);

impl PowerLossFlag {
    /// Create a cleared flag, usable in a `static`
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Signal that the supply is failing
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear after the supply has recovered
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Check if the supply is failing
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
