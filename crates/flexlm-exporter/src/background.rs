//! Background processing: the periodic poll loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flexlm_core::Poller;

// ============================================================
// Poll loop
// ============================================================

/// Polls the license server every `interval` until `shutdown` is cancelled.
///
/// The first poll runs immediately. A poll in flight when shutdown arrives
/// is dropped, which kills the `lmutil` child.
pub(crate) async fn tick_loop(
    poller: Arc<Poller>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut poll_count: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {}
        }

        let t0 = Instant::now();
        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown during poll, abandoning it");
                break;
            }
            result = poller.poll_once() => result,
        };
        let elapsed = t0.elapsed();

        // Failures are already logged by the poller.
        if let Ok(summary) = result {
            poll_count += 1;
            if poll_count == 1 {
                info!(
                    duration_ms = elapsed.as_millis() as u64,
                    server_up = summary.server_up,
                    features = summary.features,
                    checkouts = summary.checkouts,
                    "first poll completed"
                );
            } else {
                debug!(
                    duration_ms = elapsed.as_millis() as u64,
                    features = summary.features,
                    checkouts = summary.checkouts,
                    users = summary.users,
                    poll_count,
                    "poll completed"
                );
            }
        }

        if elapsed > interval / 2 {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "poll exceeded 50% of interval"
            );
        }
    }

    info!(poll_count, "poll loop stopped");
}
