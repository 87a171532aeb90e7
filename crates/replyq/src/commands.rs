// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot operator commands: `enqueue`, `stats`, `history` and
//! `reset-counts`.

use replyq_config::ReplyqConfig;
use replyq_core::{InboundMessage, ProcessingStats, QueueStats, ReplyqError, StatsSnapshot};
use serde_json::json;

use crate::serve::Services;

fn to_json(value: &serde_json::Value) -> Result<String, ReplyqError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_stats(queue: &QueueStats, processing: &ProcessingStats) -> Result<String, ReplyqError> {
    to_json(&json!({
        "queue": queue,
        "processing": processing,
    }))
}

pub fn render_history(snapshots: &[StatsSnapshot]) -> Result<String, ReplyqError> {
    to_json(&json!(snapshots))
}

/// `replyq enqueue`
pub async fn run_enqueue(
    config: &ReplyqConfig,
    from: String,
    to: String,
    body: String,
    priority: i32,
) -> Result<(), ReplyqError> {
    let services = Services::open(config).await?;
    let accepted = services
        .intake
        .accept(InboundMessage { from, to, body }, priority)
        .await?;
    println!("message {} queued as job {}", accepted.message_id, accepted.job_id);
    services.gateway.close().await;
    Ok(())
}

/// `replyq stats`
///
/// Counters read as zero while the store is unreachable.
pub async fn run_stats(config: &ReplyqConfig) -> Result<(), ReplyqError> {
    let services = Services::open(config).await?;
    let queue = services.stats.queue_stats().await;
    let processing = services.stats.processing_stats().await;
    println!("{}", render_stats(&queue, &processing)?);
    services.gateway.close().await;
    Ok(())
}

/// `replyq history`
pub async fn run_history(config: &ReplyqConfig, hours: u32) -> Result<(), ReplyqError> {
    let services = Services::open(config).await?;
    let snapshots = services.stats.history(hours).await;
    println!("{}", render_history(&snapshots)?);
    services.gateway.close().await;
    Ok(())
}

/// `replyq reset-counts`
pub async fn run_reset_counts(config: &ReplyqConfig) -> Result<(), ReplyqError> {
    let services = Services::open(config).await?;
    let reset = services.selector.reset_daily_counts().await?;
    println!("reset daily counts on {reset} channels");
    services.gateway.close().await;
    Ok(())
}
