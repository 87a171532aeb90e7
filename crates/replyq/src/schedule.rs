// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily channel counter reset at midnight UTC.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use replyq_pipeline::ChannelSelector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Time left until the next 00:00 UTC. A full day at exactly midnight.
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN).and_utc())
        .and_then(|next| (next - now).to_std().ok())
        .unwrap_or(DAY)
}

/// Reset every channel's daily count at each midnight until `cancel` fires.
///
/// A failed reset is logged and retried at the following midnight. Returns
/// the number of successful resets.
pub async fn run_daily_reset(selector: ChannelSelector, cancel: CancellationToken) -> u64 {
    let mut resets = 0;
    loop {
        let wait = until_next_midnight(Utc::now());
        debug!(wait_secs = wait.as_secs(), "next channel counter reset scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match selector.reset_daily_counts().await {
                    Ok(_) => resets += 1,
                    Err(e) => warn!(error = %e, "daily channel reset failed"),
                }
            }
            _ = cancel.cancelled() => {
                info!(resets, "channel reset task shutting down");
                break;
            }
        }
    }
    resets
}
