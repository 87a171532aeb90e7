// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for the persisted records (messages, channels, templates).

use async_trait::async_trait;

use crate::error::ReplyqError;
use crate::types::{Channel, InboundMessage, MessageCompletion, MessageRecord, Template};

/// Persistence for inbound messages and their replies.
#[async_trait]
pub trait MessageRepository: Send + Sync + 'static {
    /// Inserts a pending record and returns its id.
    async fn create_pending(&self, inbound: &InboundMessage) -> Result<i64, ReplyqError>;

    async fn get_message(&self, id: i64) -> Result<Option<MessageRecord>, ReplyqError>;

    /// Marks the record completed with the reply that was sent.
    async fn mark_completed(
        &self,
        id: i64,
        completion: &MessageCompletion,
    ) -> Result<(), ReplyqError>;

    /// Marks the record failed, storing `error` as the response text.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), ReplyqError>;

    /// Most recent records first.
    async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRecord>, ReplyqError>;
}

/// The pool of outbound sending identities.
#[async_trait]
pub trait ChannelRepository: Send + Sync + 'static {
    /// Picks the best active channel with remaining capacity and records the
    /// use, as one atomic unit. `None` when no channel qualifies.
    async fn claim_channel(&self) -> Result<Option<Channel>, ReplyqError>;

    /// Zeroes every channel's daily counter. Returns the number of channels.
    async fn reset_daily_counts(&self) -> Result<u64, ReplyqError>;

    async fn list_channels(&self) -> Result<Vec<Channel>, ReplyqError>;
}

/// Keyword-triggered canned responses.
#[async_trait]
pub trait TemplateRepository: Send + Sync + 'static {
    /// Active templates in creation order.
    async fn active_templates(&self) -> Result<Vec<Template>, ReplyqError>;

    /// Atomically adds one to a template's usage counter.
    async fn increment_usage(&self, id: i64) -> Result<(), ReplyqError>;
}

