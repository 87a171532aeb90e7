// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value store in a SQLite file, shared by every process that opens the
//! same path.
//!
//! Read-modify-write primitives run inside `BEGIN IMMEDIATE` transactions so
//! they stay atomic across processes, not only across tasks.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use replyq_core::types::epoch_secs;
use replyq_core::{KvStore, ReplyqError, ScoredMember};

use crate::database::{map_call_err, map_tr_err};
use crate::gateway::StoreConnector;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    expires_at REAL
);
CREATE TABLE IF NOT EXISTS kv_zset (
    key TEXT NOT NULL,
    member TEXT NOT NULL,
    score REAL NOT NULL,
    PRIMARY KEY (key, member)
);
CREATE INDEX IF NOT EXISTS idx_kv_zset_score ON kv_zset(key, score);
";

fn now_secs() -> f64 {
    epoch_secs(Utc::now())
}

fn live_value(
    conn: &rusqlite::Connection,
    key: &str,
    now: f64,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM kv WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
        params![key, now],
        |row| row.get(0),
    )
    .optional()
}

/// Key/value store backed by a SQLite file.
pub struct SqliteKvStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteKvStore {
    /// Open the store at `path`, creating the file and tables if needed.
    pub async fn open(path: &str) -> Result<Self, ReplyqError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ReplyqError::storage)?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ReplyqError::storage)?;
        Self::with_connection(conn, true).await
    }

    /// Open a private in-memory store.
    pub async fn open_in_memory() -> Result<Self, ReplyqError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ReplyqError::storage)?;
        Self::with_connection(conn, false).await
    }

    async fn with_connection(
        conn: tokio_rusqlite::Connection,
        wal_mode: bool,
    ) -> Result<Self, ReplyqError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(Duration::from_secs(5))?;
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            }
            conn.execute_batch(SCHEMA)
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn ping(&self) -> Result<(), ReplyqError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ReplyqError> {
        let key = key.to_string();
        let now = now_secs();
        self.conn
            .call(move |conn| live_value(conn, &key, now))
            .await
            .map_err(map_tr_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ReplyqError> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(&self, key: &str) -> Result<bool, ReplyqError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let strings = tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                let members = tx.execute("DELETE FROM kv_zset WHERE key = ?1", params![key])?;
                tx.commit()?;
                Ok(strings + members > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, ReplyqError> {
        let key = key.to_string();
        let expected = expected.map(String::from);
        let value = value.to_string();
        let now = now_secs();
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                if live_value(&tx, &key, now)? != expected {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, NULL)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
                    params![key, value],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, ReplyqError> {
        let key = key.to_string();
        let now = now_secs();
        let expires_at = ttl.map(|ttl| now + ttl.as_secs_f64());
        self.conn
            .call(move |conn| -> Result<i64, ReplyqError> {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(ReplyqError::storage)?;
                let current = live_value(&tx, &key, now).map_err(ReplyqError::storage)?;
                let next = match current {
                    Some(current) => {
                        let n = current
                            .parse::<i64>()
                            .map_err(|e| ReplyqError::MalformedRecord {
                                key: key.clone(),
                                detail: format!("not an integer: {e}"),
                            })?;
                        tx.execute(
                            "UPDATE kv SET value = ?2 WHERE key = ?1",
                            params![key, (n + 1).to_string()],
                        )
                        .map_err(ReplyqError::storage)?;
                        n + 1
                    }
                    None => {
                        tx.execute(
                            "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?1, '1', ?2)",
                            params![key, expires_at],
                        )
                        .map_err(ReplyqError::storage)?;
                        1
                    }
                };
                tx.commit().map_err(ReplyqError::storage)?;
                Ok(next)
            })
            .await
            .map_err(map_call_err)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), ReplyqError> {
        let key = key.to_string();
        let member = member.to_string();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv_zset (key, member, score) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
                    params![key, member, score],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ReplyqError> {
        let key = key.to_string();
        let member = member.to_string();
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let n = conn.execute(
                    "DELETE FROM kv_zset WHERE key = ?1 AND member = ?2",
                    params![key, member],
                )?;
                Ok(n > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zcard(&self, key: &str) -> Result<u64, ReplyqError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM kv_zset WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
            })
            .await
            .map(|n| n as u64)
            .map_err(map_tr_err)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>, ReplyqError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<ScoredMember>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT member, score FROM kv_zset
                     WHERE key = ?1 AND score >= ?2 AND score <= ?3
                     ORDER BY score ASC, member ASC",
                )?;
                let rows = stmt.query_map(params![key, min, max], |row| {
                    Ok(ScoredMember {
                        member: row.get(0)?,
                        score: row.get(1)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<u64, ReplyqError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM kv_zset WHERE key = ?1 AND score >= ?2 AND score <= ?3",
                    params![key, min, max],
                )
            })
            .await
            .map(|n| n as u64)
            .map_err(map_tr_err)
    }

    async fn zset_move(
        &self,
        src: &str,
        dst: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, ReplyqError> {
        let src = src.to_string();
        let dst = dst.to_string();
        let member = member.to_string();
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let removed = tx.execute(
                    "DELETE FROM kv_zset WHERE key = ?1 AND member = ?2",
                    params![src, member],
                )?;
                if removed == 0 {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT INTO kv_zset (key, member, score) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
                    params![dst, member, score],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn zset_pop_min_into(
        &self,
        src: &str,
        dst: &str,
        score: f64,
    ) -> Result<Option<String>, ReplyqError> {
        let src = src.to_string();
        let dst = dst.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let first: Option<String> = tx
                    .query_row(
                        "SELECT member FROM kv_zset WHERE key = ?1
                         ORDER BY score ASC, member ASC LIMIT 1",
                        params![src],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(member) = first else {
                    return Ok(None);
                };
                tx.execute(
                    "DELETE FROM kv_zset WHERE key = ?1 AND member = ?2",
                    params![src, member],
                )?;
                tx.execute(
                    "INSERT INTO kv_zset (key, member, score) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
                    params![dst, member, score],
                )?;
                tx.commit()?;
                Ok(Some(member))
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Connector that opens a fresh [`SqliteKvStore`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: String,
}

impl SqliteConnector {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StoreConnector for SqliteConnector {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path)
    }

    async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
        let store = SqliteKvStore::open(&self.path).await?;
        debug!(path = %self.path, "sqlite store opened");
        Ok(Arc::new(store))
    }
}
