// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the queue, pipeline, stats, and storage crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Formats a timestamp the way every persisted record stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Current UTC time in the persisted record format.
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Seconds since the Unix epoch with millisecond precision, used for store scores.
pub fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Unique identifier for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generates a fresh random job id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a job.
///
/// Transitions only move forward: `Queued -> Started -> Processing -> {Completed, Failed}`.
/// `Deferred` and `Scheduled` are reserved buckets the pipeline never populates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Processing,
    Completed,
    Failed,
    Deferred,
    Scheduled,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Queued | Self::Deferred | Self::Scheduled => 0,
            Self::Started => 1,
            Self::Processing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job in `self` may move to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() || matches!(next, Self::Queued | Self::Deferred | Self::Scheduled)
        {
            return false;
        }
        next.rank() > self.rank()
    }
}

/// The named status registries kept by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Registry {
    Queued,
    Started,
    Finished,
    Failed,
    Deferred,
    Scheduled,
}

impl Registry {
    pub const ALL: [Registry; 6] = [
        Registry::Queued,
        Registry::Started,
        Registry::Finished,
        Registry::Failed,
        Registry::Deferred,
        Registry::Scheduled,
    ];
}

/// Work carried by a job: the inbound message awaiting a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Id of the persisted [`MessageRecord`].
    pub message_id: i64,
    /// Sender of the inbound message; the reply goes back here.
    pub from: String,
    /// Recipient the inbound message was addressed to.
    pub to: String,
    /// Inbound message text.
    pub body: String,
}

/// A unit of work in the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub status: JobStatus,
    /// Accepted and stored, not used for dequeue order.
    #[serde(default)]
    pub priority: i32,
    pub enqueued_at: f64,
    #[serde(default)]
    pub started_at: Option<f64>,
    #[serde(default)]
    pub completed_at: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An outbound sending identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    /// Display name shown to operators.
    pub name: String,
    /// Address replies are sent from (for SMS, an E.164 phone number).
    pub address: String,
    /// Higher wins.
    pub priority: i32,
    pub is_active: bool,
    pub daily_message_count: i64,
    /// Daily cap; `None` means unlimited.
    pub daily_limit: Option<i64>,
    pub last_used_at: Option<String>,
}

impl Channel {
    /// Whether this channel may still send today.
    pub fn has_capacity(&self) -> bool {
        self.daily_limit
            .is_none_or(|limit| self.daily_message_count < limit)
    }
}

/// The identity chosen for one outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedChannel {
    /// `None` when the configured default identity was used.
    pub channel_id: Option<i64>,
    pub address: String,
}

impl From<Channel> for SelectedChannel {
    fn from(channel: Channel) -> Self {
        Self {
            channel_id: Some(channel.id),
            address: channel.address,
        }
    }
}

/// A keyword-triggered canned response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub keywords: Vec<String>,
    pub response: String,
    pub is_active: bool,
    pub usage_count: i64,
    pub created_at: String,
}

impl Template {
    /// Whether any keyword occurs in `body`, ignoring case. Blank keywords never match.
    pub fn matches(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.keywords.iter().any(|keyword| {
            let keyword = keyword.trim().to_lowercase();
            !keyword.is_empty() && body.contains(&keyword)
        })
    }
}

/// Status of a persisted inbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An inbound message and the reply generated for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub from_number: String,
    pub to_number: String,
    pub content: String,
    pub response: Option<String>,
    pub status: MessageStatus,
    pub template_id: Option<i64>,
    /// Address the reply was sent from.
    pub channel_used: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

/// An inbound message as received from the intake surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Fields written when a message completes successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCompletion {
    pub response: String,
    pub template_id: Option<i64>,
    pub channel_used: String,
}

/// Sizes of the six queue registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: u64,
    pub started: u64,
    pub failed: u64,
    pub finished: u64,
    pub deferred: u64,
    pub scheduled: u64,
}

/// A point-in-time record of queue registry sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(flatten)]
    pub counts: QueueStats,
}

/// Message volume for one hour bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyVolume {
    /// Bucket label, `YYYY-MM-DD-HH` in UTC.
    pub hour: String,
    pub count: i64,
}

/// The running processing aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Mean processing time in seconds.
    pub avg_processing_time: f64,
    pub total_processed: u64,
    /// Percentage of successful jobs, 0..=100.
    pub success_rate: f64,
    pub hourly_volume: Vec<HourlyVolume>,
    /// Explicit running success counter. Absent in documents written by older writers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_count: Option<u64>,
}

impl ProcessingStats {
    /// The success counter, derived from the stored rate when the document predates it.
    pub fn successes(&self) -> u64 {
        self.success_count.unwrap_or_else(|| {
            (self.success_rate / 100.0 * self.total_processed as f64).round() as u64
        })
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}
