// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by external provider integrations.

use async_trait::async_trait;

use crate::error::ReplyqError;
use crate::types::HealthStatus;

/// The base trait for adapters that talk to an external provider.
///
/// Provides identity and a health check so the composition root can log
/// which integrations are live at startup.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, ReplyqError>;
}
