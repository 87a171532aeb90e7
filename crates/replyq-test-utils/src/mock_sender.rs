// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outbound sender that captures replies for assertion in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use replyq_core::{HealthStatus, OutboundSender, PluginAdapter, ReplyqError};

/// One captured outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockSender {
    fn name(&self) -> &str {
        "mock-sender"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl OutboundSender for MockSender {
    async fn send(&self, from: &str, to: &str, text: &str) -> Result<String, ReplyqError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReplyqError::Send {
                message: "mock sender failure".to_string(),
                source: None,
            });
        }
        let mut sent = self.sent.lock().await;
        sent.push(SentMessage {
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(format!("SM{:032}", sent.len()))
    }
}
