// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message record operations.

use replyq_core::types::timestamp_now;
use replyq_core::{InboundMessage, MessageCompletion, MessageRecord, MessageStatus, ReplyqError};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const MESSAGE_COLUMNS: &str = "id, from_number, to_number, content, response, status, \
                               template_id, channel_used, created_at, processed_at";

fn message_from_row(row: &Row<'_>) -> Result<MessageRecord, rusqlite::Error> {
    let status: String = row.get(5)?;
    let status = status.parse::<MessageStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(MessageRecord {
        id: row.get(0)?,
        from_number: row.get(1)?,
        to_number: row.get(2)?,
        content: row.get(3)?,
        response: row.get(4)?,
        status,
        template_id: row.get(6)?,
        channel_used: row.get(7)?,
        created_at: row.get(8)?,
        processed_at: row.get(9)?,
    })
}

/// Insert a pending record for an inbound message. Returns the new id.
pub async fn insert_pending(db: &Database, inbound: &InboundMessage) -> Result<i64, ReplyqError> {
    let inbound = inbound.clone();
    let created_at = timestamp_now();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (from_number, to_number, content, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                params![inbound.from, inbound.to, inbound.body, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one record by id.
pub async fn get_message(db: &Database, id: i64) -> Result<Option<MessageRecord>, ReplyqError> {
    db.connection()
        .call(move |conn| -> Result<Option<MessageRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Record the reply that was sent. Returns the number of rows updated.
pub async fn mark_completed(
    db: &Database,
    id: i64,
    completion: &MessageCompletion,
) -> Result<usize, ReplyqError> {
    let completion = completion.clone();
    let processed_at = timestamp_now();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages
                 SET status = 'completed', response = ?2, template_id = ?3,
                     channel_used = ?4, processed_at = ?5
                 WHERE id = ?1",
                params![
                    id,
                    completion.response,
                    completion.template_id,
                    completion.channel_used,
                    processed_at,
                ],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a record failed, storing the error text as its response.
pub async fn mark_failed(db: &Database, id: i64, error: &str) -> Result<usize, ReplyqError> {
    let error = error.to_string();
    let processed_at = timestamp_now();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET status = 'failed', response = ?2, processed_at = ?3
                 WHERE id = ?1",
                params![id, error, processed_at],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent records first.
pub async fn recent_messages(db: &Database, limit: i64) -> Result<Vec<MessageRecord>, ReplyqError> {
    db.connection()
        .call(move |conn| -> Result<Vec<MessageRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
