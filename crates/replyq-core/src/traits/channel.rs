// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sender trait for delivery providers (Twilio, etc.).

use async_trait::async_trait;

use crate::error::ReplyqError;
use crate::traits::adapter::PluginAdapter;

/// Delivers a reply from one of our sending identities.
#[async_trait]
pub trait OutboundSender: PluginAdapter {
    /// Sends `text` from `from` to `to`, returning the provider's message id.
    async fn send(&self, from: &str, to: &str, text: &str) -> Result<String, ReplyqError>;
}
