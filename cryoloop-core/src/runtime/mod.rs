//! Scheduler and fault handling
//!
//! The [`Runtime`] context, its phase machine, the operation watchdog, the
//! staged fault markers, the out-of-band trap line and the power-loss gate.

mod context;
#[cfg(feature = "embassy")]
pub mod driver;
pub mod events;
pub mod fault;
pub mod phase;
pub mod power;
pub mod shared;
mod tick;
pub mod trap;
pub mod watchdog;

pub use context::{BootReport, RestartReason, Runtime, TickOutcome};
pub use events::Event;
pub use fault::{FaultStage, PURGE_MARKER, STAGE_MARKERS};
pub use phase::Phase;
pub use power::PowerLossFlag;
pub use shared::SharedRuntime;
pub use tick::{Halted, TickContext};
pub use trap::{Trap, TrapLine};
pub use watchdog::Watchdog;
