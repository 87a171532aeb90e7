// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A shared store whose availability the test controls.
//!
//! [`FlakyConnector`] hands out [`FlakyStore`] handles over one in-memory
//! store. Taking it offline makes connects fail and every primitive on
//! existing handles return a storage error, the way a dropped network
//! connection would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use replyq_core::{KvStore, ReplyqError, ScoredMember};
use replyq_store::{MemoryStore, StoreConnector};

fn offline() -> ReplyqError {
    ReplyqError::storage(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "store offline",
    ))
}

/// A store handle that fails while its switch is off.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    down: Arc<AtomicBool>,
}

impl FlakyStore {
    fn check(&self) -> Result<(), ReplyqError> {
        if self.down.load(Ordering::SeqCst) {
            Err(offline())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn ping(&self) -> Result<(), ReplyqError> {
        self.check()?;
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ReplyqError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ReplyqError> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, ReplyqError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, ReplyqError> {
        self.check()?;
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, ReplyqError> {
        self.check()?;
        self.inner.incr(key, ttl).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), ReplyqError> {
        self.check()?;
        self.inner.zadd(key, member, score).await
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ReplyqError> {
        self.check()?;
        self.inner.zrem(key, member).await
    }

    async fn zcard(&self, key: &str) -> Result<u64, ReplyqError> {
        self.check()?;
        self.inner.zcard(key).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>, ReplyqError> {
        self.check()?;
        self.inner.zrange_by_score(key, min, max).await
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<u64, ReplyqError> {
        self.check()?;
        self.inner.zrem_range_by_score(key, min, max).await
    }

    async fn zset_move(
        &self,
        src: &str,
        dst: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, ReplyqError> {
        self.check()?;
        self.inner.zset_move(src, dst, member, score).await
    }

    async fn zset_pop_min_into(
        &self,
        src: &str,
        dst: &str,
        score: f64,
    ) -> Result<Option<String>, ReplyqError> {
        self.check()?;
        self.inner.zset_pop_min_into(src, dst, score).await
    }
}

/// Connector over one shared in-memory store with an on/off switch.
#[derive(Clone, Default)]
pub struct FlakyConnector {
    store: Arc<MemoryStore>,
    down: Arc<AtomicBool>,
    connects: Arc<AtomicU32>,
}

impl FlakyConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    /// Number of connect attempts so far, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// The underlying store, bypassing the switch.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    fn describe(&self) -> String {
        "flaky-memory".to_string()
    }

    async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.is_down() {
            return Err(offline());
        }
        Ok(Arc::new(FlakyStore {
            inner: Arc::clone(&self.store),
            down: Arc::clone(&self.down),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replyq_store::StoreGateway;

    #[tokio::test]
    async fn offline_handles_fail_and_recover() {
        let connector = FlakyConnector::new();
        let store = connector.connect().await.unwrap();
        store.set("k", "v").await.unwrap();

        connector.set_down(true);
        assert!(store.get("k").await.unwrap_err().is_store_failure());
        assert!(connector.connect().await.is_err());

        connector.set_down(false);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn gateway_drops_handle_while_offline() {
        let connector = FlakyConnector::new();
        let gateway = StoreGateway::connect(Arc::new(connector.clone()), 1, Duration::ZERO)
            .await
            .unwrap();

        connector.set_down(true);
        assert!(gateway.healthy_connection().await.is_none());
        assert!(gateway.get_connection().await.is_none());

        connector.set_down(false);
        assert!(gateway.healthy_connection().await.is_some());
        assert_eq!(connector.connect_attempts(), 3);
    }
}
