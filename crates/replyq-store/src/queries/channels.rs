// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound channel operations, including the atomic claim used for
//! load balancing across sending identities.

use replyq_core::types::timestamp_now;
use replyq_core::{Channel, ReplyqError};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};

const CHANNEL_COLUMNS: &str =
    "id, name, address, priority, is_active, daily_message_count, daily_limit, last_used_at";

fn channel_from_row(row: &Row<'_>) -> Result<Channel, rusqlite::Error> {
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        priority: row.get(3)?,
        is_active: row.get(4)?,
        daily_message_count: row.get(5)?,
        daily_limit: row.get(6)?,
        last_used_at: row.get(7)?,
    })
}

/// Fields for a new channel row.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub address: String,
    pub priority: i32,
    pub is_active: bool,
    pub daily_limit: Option<i64>,
}

/// Insert a channel. Returns the new id.
pub async fn insert_channel(db: &Database, channel: &NewChannel) -> Result<i64, ReplyqError> {
    let channel = channel.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO channels (name, address, priority, is_active, daily_limit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    channel.name,
                    channel.address,
                    channel.priority,
                    channel.is_active,
                    channel.daily_limit,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Pick the best eligible channel and record one use of it.
///
/// Eligible means active and below its daily limit. Ordering is priority
/// descending, then today's count ascending, then id. The read and the
/// increment share one immediate transaction.
pub async fn claim_channel(db: &Database) -> Result<Option<Channel>, ReplyqError> {
    let used_at = timestamp_now();
    db.connection()
        .call(move |conn| -> Result<Option<Channel>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let picked = tx
                .query_row(
                    &format!(
                        "SELECT {CHANNEL_COLUMNS} FROM channels
                         WHERE is_active = 1
                           AND (daily_limit IS NULL OR daily_message_count < daily_limit)
                         ORDER BY priority DESC, daily_message_count ASC, id ASC
                         LIMIT 1"
                    ),
                    [],
                    channel_from_row,
                )
                .optional()?;

            let Some(mut channel) = picked else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                "UPDATE channels
                 SET daily_message_count = daily_message_count + 1, last_used_at = ?2
                 WHERE id = ?1",
                params![channel.id, used_at],
            )?;
            tx.commit()?;

            channel.daily_message_count += 1;
            channel.last_used_at = Some(used_at);
            Ok(Some(channel))
        })
        .await
        .map_err(map_tr_err)
}

/// Zero every channel's daily counter. Returns the number of channels touched.
pub async fn reset_daily_counts(db: &Database) -> Result<u64, ReplyqError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            conn.execute("UPDATE channels SET daily_message_count = 0", [])
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// All channels ordered by id.
pub async fn list_channels(db: &Database) -> Result<Vec<Channel>, ReplyqError> {
    db.connection()
        .call(|conn| -> Result<Vec<Channel>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY id"))?;
            let rows = stmt.query_map([], channel_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(address: &str, priority: i32) -> NewChannel {
        NewChannel {
            name: format!("line {address}"),
            address: address.to_string(),
            priority,
            is_active: true,
            daily_limit: None,
        }
    }

    #[tokio::test]
    async fn claim_prefers_highest_priority() {
        let db = Database::open_in_memory().await.unwrap();
        insert_channel(&db, &channel("+1000", 1)).await.unwrap();
        insert_channel(&db, &channel("+2000", 5)).await.unwrap();

        let picked = claim_channel(&db).await.unwrap().unwrap();
        assert_eq!(picked.address, "+2000");
        assert_eq!(picked.daily_message_count, 1);
        assert!(picked.last_used_at.is_some());
    }

    #[tokio::test]
    async fn claim_balances_equal_priority_by_count() {
        let db = Database::open_in_memory().await.unwrap();
        insert_channel(&db, &channel("+1000", 3)).await.unwrap();
        insert_channel(&db, &channel("+2000", 3)).await.unwrap();

        let first = claim_channel(&db).await.unwrap().unwrap();
        let second = claim_channel(&db).await.unwrap().unwrap();
        let third = claim_channel(&db).await.unwrap().unwrap();
        assert_eq!(first.address, "+1000");
        assert_eq!(second.address, "+2000");
        assert_eq!(third.address, "+1000");
    }

    #[tokio::test]
    async fn claim_skips_inactive_and_capped() {
        let db = Database::open_in_memory().await.unwrap();
        let mut inactive = channel("+1000", 10);
        inactive.is_active = false;
        insert_channel(&db, &inactive).await.unwrap();
        let mut capped = channel("+2000", 5);
        capped.daily_limit = Some(1);
        insert_channel(&db, &capped).await.unwrap();
        insert_channel(&db, &channel("+3000", 0)).await.unwrap();

        assert_eq!(claim_channel(&db).await.unwrap().unwrap().address, "+2000");
        assert_eq!(claim_channel(&db).await.unwrap().unwrap().address, "+3000");
        assert_eq!(claim_channel(&db).await.unwrap().unwrap().address, "+3000");
    }

    #[tokio::test]
    async fn claim_with_no_channels_is_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(claim_channel(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_zeroes_all_counts() {
        let db = Database::open_in_memory().await.unwrap();
        insert_channel(&db, &channel("+1000", 1)).await.unwrap();
        insert_channel(&db, &channel("+2000", 1)).await.unwrap();
        for _ in 0..4 {
            claim_channel(&db).await.unwrap();
        }

        assert_eq!(reset_daily_counts(&db).await.unwrap(), 2);
        assert_eq!(reset_daily_counts(&db).await.unwrap(), 2);
        let channels = list_channels(&db).await.unwrap();
        assert!(channels.iter().all(|c| c.daily_message_count == 0));
    }
}
