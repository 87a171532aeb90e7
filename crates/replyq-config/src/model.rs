// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Replyq.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Replyq configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyqConfig {
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Shared volatile store (queue registries, stats) settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Record database (messages, channels, templates) settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Twilio SMS delivery settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// OpenAI generative responder settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Stats aggregation settings.
    #[serde(default)]
    pub stats: StatsConfig,

    /// Inbound webhook server settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent worker tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sleep between polls when the queue is empty or the store is down.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Name of the job queue the workers consume.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            queue_name: default_queue_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_queue_name() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which backend holds the shared volatile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file shared by every process pointing at the same path.
    #[default]
    Sqlite,
    /// In-process memory; only useful when webhook and workers share a process.
    Memory,
}

/// Shared volatile store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path of the store file (sqlite backend only).
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Connection attempts before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay between connection attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            connect_retries: default_connect_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_store_path() -> String {
    data_file("store.db")
}

fn default_connect_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Record database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    data_file("replyq.db")
}

fn default_wal_mode() -> bool {
    true
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("replyq").join(name))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| name.to_string())
}

/// Twilio SMS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// Twilio account SID. `None` disables outbound delivery.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Twilio auth token, also used to verify webhook signatures.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sending identity used when no channel is available.
    #[serde(default)]
    pub default_from: Option<String>,

    /// Twilio REST API base URL.
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            default_from: None,
            api_base: default_twilio_api_base(),
        }
    }
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// OpenAI configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// OpenAI API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat model used for generated replies.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Request timeout.
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            api_base: default_openai_api_base(),
            timeout_secs: default_openai_timeout_secs(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    30
}

/// Stats aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    /// How often `serve` records a queue snapshot.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    /// Snapshots older than this are pruned.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Attempts for a history range query before returning empty.
    #[serde(default = "default_history_max_attempts")]
    pub history_max_attempts: u32,

    /// Fixed delay between history attempts.
    #[serde(default = "default_history_retry_delay_ms")]
    pub history_retry_delay_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval_secs(),
            retention_days: default_retention_days(),
            history_max_attempts: default_history_max_attempts(),
            history_retry_delay_ms: default_history_retry_delay_ms(),
        }
    }
}

fn default_snapshot_interval_secs() -> u64 {
    60
}

fn default_retention_days() -> u32 {
    7
}

fn default_history_max_attempts() -> u32 {
    3
}

fn default_history_retry_delay_ms() -> u64 {
    1000
}

/// Inbound webhook server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// IP address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reject requests without a valid `X-Twilio-Signature`.
    #[serde(default)]
    pub validate_signature: bool,

    /// Externally visible URL of the webhook, used for signature checks.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            validate_signature: false,
            public_url: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}
