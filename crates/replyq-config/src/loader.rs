// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./replyq.toml` > `~/.config/replyq/replyq.toml` > `/etc/replyq/replyq.toml`
//! with environment variable overrides via `REPLYQ_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ReplyqConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/replyq/replyq.toml` (system-wide)
/// 3. `~/.config/replyq/replyq.toml` (user XDG config)
/// 4. `./replyq.toml` (local directory)
/// 5. `REPLYQ_*` environment variables
pub fn load_config() -> Result<ReplyqConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ReplyqConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReplyqConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ReplyqConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReplyqConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ReplyqConfig::default()))
        .merge(Toml::file("/etc/replyq/replyq.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("replyq/replyq.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("replyq.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `REPLYQ_SMS_AUTH_TOKEN` must map to `sms.auth_token`, not `sms.auth.token`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("REPLYQ_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name onto its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 7] = [
        "worker", "store", "database", "sms", "openai", "stats", "webhook",
    ];
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
