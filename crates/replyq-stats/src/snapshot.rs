// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic snapshot task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::StatsAggregator;

/// Record a snapshot every `interval` until `cancel` fires.
///
/// The first snapshot is taken one full interval after start. Returns how
/// many snapshots were recorded.
pub async fn run_snapshot_loop(
    stats: Arc<StatsAggregator>,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut recorded = 0;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the first immediate tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(snapshot) = stats.record_snapshot().await {
                    recorded += 1;
                    debug!(
                        queued = snapshot.counts.queued,
                        started = snapshot.counts.started,
                        finished = snapshot.counts.finished,
                        failed = snapshot.counts.failed,
                        "stats snapshot recorded"
                    );
                }
            }
            _ = cancel.cancelled() => {
                info!(recorded, "snapshot task shutting down");
                break;
            }
        }
    }
    recorded
}
