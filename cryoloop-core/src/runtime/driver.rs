//! Periodic tick driver
//!
//! Boots the runtime and ticks it from an `embassy_time::Ticker` until it
//! asks for a restart. The caller owns the reset itself.

use cryoloop_hal::FileStorage;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Ticker};

use super::context::{RestartReason, TickOutcome};
use super::shared::SharedRuntime;

/// Drive `runtime` at its configured tick period
///
/// Returns the reason once a restart is required.
pub async fn run<M: RawMutex, S: FileStorage>(runtime: &SharedRuntime<M, S>) -> RestartReason {
    let period_ms = runtime.lock(|rt| rt.config().tick_period_ms);
    info!("Tick driver started, period {} ms", period_ms);

    let start = Instant::now();
    let report = runtime.boot(0);
    if report.prior_fault {
        warn!("Running after a prior fault");
    }

    let mut ticker = Ticker::every(Duration::from_millis(u64::from(period_ms)));
    loop {
        ticker.next().await;

        let now_ms = start.elapsed().as_millis();
        if let TickOutcome::Restart(reason) = runtime.tick(now_ms) {
            warn!("Restart requested: {:?}", reason);
            return reason;
        }
    }
}
