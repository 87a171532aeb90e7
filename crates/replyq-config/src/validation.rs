// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero worker counts, non-empty paths, and a parseable bind address.

use crate::diagnostic::ConfigError;
use crate::model::{ReplyqConfig, StoreBackend};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ReplyqConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.worker.concurrency == 0 {
        fail("worker.concurrency must be at least 1".to_string());
    }

    if config.worker.queue_name.trim().is_empty() {
        fail("worker.queue_name must not be empty".to_string());
    } else if config.worker.queue_name.contains(':') {
        fail(format!(
            "worker.queue_name `{}` must not contain `:`",
            config.worker.queue_name
        ));
    }

    if !LOG_LEVELS.contains(&config.worker.log_level.as_str()) {
        fail(format!(
            "worker.log_level `{}` is not one of {}",
            config.worker.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.path.trim().is_empty() {
        fail("store.path must not be empty for the sqlite backend".to_string());
    }

    if config.store.connect_retries == 0 {
        fail("store.connect_retries must be at least 1".to_string());
    }

    if config.database.path.trim().is_empty() {
        fail("database.path must not be empty".to_string());
    }

    if config.stats.snapshot_interval_secs == 0 {
        fail("stats.snapshot_interval_secs must be at least 1".to_string());
    }

    if config.stats.retention_days == 0 {
        fail("stats.retention_days must be at least 1".to_string());
    }

    if config.stats.history_max_attempts == 0 {
        fail("stats.history_max_attempts must be at least 1".to_string());
    }

    if config.openai.timeout_secs == 0 {
        fail("openai.timeout_secs must be at least 1".to_string());
    }

    let addr = config.webhook.bind_address.trim();
    if addr.is_empty() {
        fail("webhook.bind_address must not be empty".to_string());
    } else if addr.parse::<std::net::IpAddr>().is_err() {
        fail(format!("webhook.bind_address `{addr}` is not a valid IP address"));
    }

    if config.webhook.validate_signature {
        if config.sms.auth_token.is_none() {
            fail("webhook.validate_signature requires sms.auth_token".to_string());
        }
        if config.webhook.public_url.is_none() {
            fail("webhook.validate_signature requires webhook.public_url".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
