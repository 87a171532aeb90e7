// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative responder trait (OpenAI and friends).

use async_trait::async_trait;

use crate::error::ReplyqError;
use crate::traits::adapter::PluginAdapter;

/// Produces free-form reply text for messages no template matched.
#[async_trait]
pub trait Responder: PluginAdapter {
    /// Generates a reply for `prompt`. Failures are returned, never papered over.
    async fn generate(&self, prompt: &str) -> Result<String, ReplyqError>;
}
