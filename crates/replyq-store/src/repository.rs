// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the record repository traits.

use async_trait::async_trait;

use replyq_core::{
    Channel, ChannelRepository, HealthStatus, InboundMessage, MessageCompletion, MessageRecord,
    MessageRepository, PluginAdapter, ReplyqError, Template, TemplateRepository,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{channels, messages, templates};

/// Record repositories backed by one [`Database`].
#[derive(Clone)]
pub struct SqliteRecords {
    db: Database,
}

impl SqliteRecords {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database, for seeding and maintenance.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn message_not_found(id: i64) -> ReplyqError {
    ReplyqError::NotFound {
        entity: "message".to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl PluginAdapter for SqliteRecords {
    fn name(&self) -> &str {
        "sqlite-records"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessageRepository for SqliteRecords {
    async fn create_pending(&self, inbound: &InboundMessage) -> Result<i64, ReplyqError> {
        messages::insert_pending(&self.db, inbound).await
    }

    async fn get_message(&self, id: i64) -> Result<Option<MessageRecord>, ReplyqError> {
        messages::get_message(&self.db, id).await
    }

    async fn mark_completed(
        &self,
        id: i64,
        completion: &MessageCompletion,
    ) -> Result<(), ReplyqError> {
        match messages::mark_completed(&self.db, id, completion).await? {
            0 => Err(message_not_found(id)),
            _ => Ok(()),
        }
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), ReplyqError> {
        match messages::mark_failed(&self.db, id, error).await? {
            0 => Err(message_not_found(id)),
            _ => Ok(()),
        }
    }

    async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRecord>, ReplyqError> {
        messages::recent_messages(&self.db, limit).await
    }
}

#[async_trait]
impl ChannelRepository for SqliteRecords {
    async fn claim_channel(&self) -> Result<Option<Channel>, ReplyqError> {
        channels::claim_channel(&self.db).await
    }

    async fn reset_daily_counts(&self) -> Result<u64, ReplyqError> {
        channels::reset_daily_counts(&self.db).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ReplyqError> {
        channels::list_channels(&self.db).await
    }
}

#[async_trait]
impl TemplateRepository for SqliteRecords {
    async fn active_templates(&self) -> Result<Vec<Template>, ReplyqError> {
        templates::active_templates(&self.db).await
    }

    async fn increment_usage(&self, id: i64) -> Result<(), ReplyqError> {
        templates::increment_usage(&self.db, id).await.map(|_| ())
    }
}
