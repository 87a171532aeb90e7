// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process key/value store.
//!
//! Every primitive holds one async mutex for its whole duration, so
//! compare-and-swap, increment and pop-and-move are atomic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use replyq_core::{KvStore, ReplyqError, ScoredMember};

use crate::gateway::StoreConnector;

struct StringEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StringEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

impl Inner {
    fn live_value(&mut self, key: &str) -> Option<&str> {
        let now = Utc::now();
        if self.strings.get(key).is_some_and(|e| !e.is_live(now)) {
            self.strings.remove(key);
        }
        self.strings.get(key).map(|e| e.value.as_str())
    }

    fn sorted(&self, key: &str) -> Vec<ScoredMember> {
        let mut members: Vec<ScoredMember> = self
            .zsets
            .get(key)
            .map(|set| {
                set.iter()
                    .map(|(member, score)| ScoredMember {
                        member: member.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();
        members.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.member.cmp(&b.member)));
        members
    }

    fn remove_member(&mut self, key: &str, member: &str) -> bool {
        let Some(set) = self.zsets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member).is_some();
        if set.is_empty() {
            self.zsets.remove(key);
        }
        removed
    }
}

/// Key/value store living in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), ReplyqError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ReplyqError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.live_value(key).map(String::from))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ReplyqError> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, ReplyqError> {
        let mut inner = self.inner.lock().await;
        let string = inner.strings.remove(key).is_some();
        let zset = inner.zsets.remove(key).is_some();
        Ok(string || zset)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, ReplyqError> {
        let mut inner = self.inner.lock().await;
        if inner.live_value(key) != expected {
            return Ok(false);
        }
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, ReplyqError> {
        let mut inner = self.inner.lock().await;
        let next = match inner.live_value(key) {
            Some(current) => {
                current
                    .parse::<i64>()
                    .map_err(|e| ReplyqError::MalformedRecord {
                        key: key.to_string(),
                        detail: format!("not an integer: {e}"),
                    })?
                    + 1
            }
            None => 1,
        };
        match inner.strings.get_mut(key) {
            Some(entry) => entry.value = next.to_string(),
            None => {
                let expires_at = ttl
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                    .map(|ttl| Utc::now() + ttl);
                inner.strings.insert(
                    key.to_string(),
                    StringEntry {
                        value: next.to_string(),
                        expires_at,
                    },
                );
            }
        }
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), ReplyqError> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ReplyqError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.remove_member(key, member))
    }

    async fn zcard(&self, key: &str) -> Result<u64, ReplyqError> {
        let inner = self.inner.lock().await;
        Ok(inner.zsets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>, ReplyqError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sorted(key)
            .into_iter()
            .filter(|m| m.score >= min && m.score <= max)
            .collect())
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<u64, ReplyqError> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|_, score| *score < min || *score > max);
        let removed = (before - set.len()) as u64;
        if set.is_empty() {
            inner.zsets.remove(key);
        }
        Ok(removed)
    }

    async fn zset_move(
        &self,
        src: &str,
        dst: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, ReplyqError> {
        let mut inner = self.inner.lock().await;
        if !inner.remove_member(src, member) {
            return Ok(false);
        }
        inner
            .zsets
            .entry(dst.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(true)
    }

    async fn zset_pop_min_into(
        &self,
        src: &str,
        dst: &str,
        score: f64,
    ) -> Result<Option<String>, ReplyqError> {
        let mut inner = self.inner.lock().await;
        let Some(first) = inner.sorted(src).into_iter().next() else {
            return Ok(None);
        };
        inner.remove_member(src, &first.member);
        inner
            .zsets
            .entry(dst.to_string())
            .or_default()
            .insert(first.member.clone(), score);
        Ok(Some(first.member))
    }
}

/// Connector that always hands out the same shared [`MemoryStore`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
        Ok(self.store.clone())
    }
}
