// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI responder for Replyq.
//!
//! This crate implements [`Responder`] over the Chat Completions API. The
//! inbound message body is sent as a single user message and the first
//! choice's text is returned verbatim.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use replyq_config::model::OpenAiConfig;
use replyq_core::{HealthStatus, PluginAdapter, ReplyqError, Responder};
use tracing::{debug, info};

use crate::client::OpenAiClient;

/// Generates replies with an OpenAI chat model.
pub struct OpenAiResponder {
    client: OpenAiClient,
}

impl OpenAiResponder {
    /// Creates a responder from the `[openai]` configuration section.
    ///
    /// API key resolution order: `openai.api_key`, then the
    /// `OPENAI_API_KEY` environment variable.
    pub fn new(config: &OpenAiConfig) -> Result<Self, ReplyqError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            config.model.clone(),
            &config.api_base,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = config.model, "OpenAI responder initialized");
        Ok(Self { client })
    }

    pub fn from_client(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiResponder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        // A real request would spend tokens.
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate(&self, prompt: &str) -> Result<String, ReplyqError> {
        debug!(model = self.client.model(), chars = prompt.len(), "generating reply");
        self.client.complete(prompt).await
    }
}

/// Resolves the API key from config, falling back to `OPENAI_API_KEY`.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, ReplyqError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        ReplyqError::Config(
            "OpenAI API key not found. Set openai.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}
