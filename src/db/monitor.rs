//! Periodic pool statistics reporting.
//!
//! One monitor task runs per registered node. It samples the node's pool every
//! [`MONITOR_INTERVAL`] and reports the snapshot on the `run` channel until the
//! registry's cancellation token fires. Monitors never close or replace handles.

use crate::db::handle::{NodeHandle, PoolControl};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Sampling interval for every node.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(20);

/// Spawn the stats monitor for `node` on `tracker`.
///
/// The task is not awaited; it exits only when `token` is cancelled.
pub fn spawn_monitor<H: NodeHandle>(
    tracker: &TaskTracker,
    token: CancellationToken,
    node: String,
    handle: Arc<H>,
) {
    tracker.spawn(run_monitor(token, node, handle, MONITOR_INTERVAL));
}

async fn run_monitor<H: NodeHandle>(
    token: CancellationToken,
    node: String,
    handle: Arc<H>,
    period: Duration,
) {
    // First sample one full period after start.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(node = %node, period = ?period, "Stats monitor started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(node = %node, "Stats monitor stopped");
                return;
            }
            _ = ticker.tick() => sample(&node, handle.as_ref()),
        }
    }
}

fn sample<H: NodeHandle>(node: &str, handle: &H) {
    let pool = match handle.pool() {
        Ok(pool) => pool,
        Err(e) => {
            warn!(target: "run", node = %node, error = %e, "mysql stat: pool unavailable");
            return;
        }
    };

    let stat = pool.stats();
    info!(
        target: "run",
        node = %node,
        open = stat.open,
        in_use = stat.in_use,
        idle = stat.idle,
        wait_count = stat.wait_count,
        wait_duration = ?stat.wait_duration,
        "mysql stat"
    );
}
