//! Once-per-second timer advancement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::daemon::session::SharedTimer;

/// How often the timer advances.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the ticker. It runs until `shutdown` is notified.
///
/// Missed ticks (e.g. across a system suspend) are skipped rather than
/// replayed, so lost time is simply lost.
pub fn spawn(timer: SharedTimer, shutdown: Arc<Notify>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Created once so a notification sent mid-tick is not lost.
        let stopped = shutdown.notified();
        tokio::pin!(stopped);

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    timer.tick().await;
                }
                _ = &mut stopped => {
                    debug!("Ticker stopping");
                    break;
                }
            }
        }
    })
}
