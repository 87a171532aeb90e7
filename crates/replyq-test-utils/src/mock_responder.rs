// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generative responder for deterministic testing.
//!
//! `MockResponder` implements `Responder` with pre-configured replies,
//! enabling fast tests without external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use replyq_core::{HealthStatus, PluginAdapter, ReplyqError, Responder};

/// A responder that returns queued replies and records every prompt.
///
/// Replies are popped from a FIFO queue. When the queue is empty,
/// `"mock response"` is returned.
#[derive(Default)]
pub struct MockResponder {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a responder pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            ..Self::default()
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn add_reply(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(text.into());
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Prompts received so far, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockResponder {
    fn name(&self) -> &str {
        "mock-responder"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn generate(&self, prompt: &str) -> Result<String, ReplyqError> {
        self.prompts.lock().await.push(prompt.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReplyqError::Responder {
                message: "mock responder failure".to_string(),
                source: None,
            });
        }
        Ok(self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock response".to_string()))
    }
}
