// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilient handle to the shared volatile store.
//!
//! The gateway owns at most one live [`KvStore`] handle. A handle that fails a
//! ping is dropped, and the next caller reconnects with bounded retries.
//! Callers treat `None` as "store unavailable" and degrade.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use replyq_config::model::{StoreBackend, StoreConfig};
use replyq_core::{KvStore, ReplyqError};

use crate::memory::MemoryConnector;
use crate::sqlite::SqliteConnector;

/// Opens new handles to a store backend.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    /// Short description for logs.
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError>;
}

/// Build the connector selected by configuration.
pub fn connector_from_config(config: &StoreConfig) -> Arc<dyn StoreConnector> {
    match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteConnector::new(config.path.clone())),
        StoreBackend::Memory => Arc::new(MemoryConnector::default()),
    }
}

/// Shared store handle with connect, lazy reconnect and health probing.
pub struct StoreGateway {
    connector: Arc<dyn StoreConnector>,
    handle: Mutex<Option<Arc<dyn KvStore>>>,
    retries: u32,
    retry_delay: Duration,
}

impl StoreGateway {
    /// Connect, trying up to `retries` times with `retry_delay` between
    /// attempts. Fails with [`ReplyqError::StoreUnavailable`] after the last one.
    pub async fn connect(
        connector: Arc<dyn StoreConnector>,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, ReplyqError> {
        let gateway = Self::disconnected(connector, retries, retry_delay);
        let store = gateway
            .open_with_retries()
            .await
            .ok_or(ReplyqError::StoreUnavailable)?;
        *gateway.handle.lock().await = Some(store);
        info!(store = %gateway.connector.describe(), "store connected");
        Ok(gateway)
    }

    /// Connect using the `[store]` configuration section.
    pub async fn from_config(config: &StoreConfig) -> Result<Self, ReplyqError> {
        Self::connect(
            connector_from_config(config),
            config.connect_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
        .await
    }

    /// A gateway with no handle yet; the first `get_connection` connects.
    pub fn disconnected(
        connector: Arc<dyn StoreConnector>,
        retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            connector,
            handle: Mutex::new(None),
            retries: retries.max(1),
            retry_delay,
        }
    }

    async fn open_with_retries(&self) -> Option<Arc<dyn KvStore>> {
        for attempt in 1..=self.retries {
            let result = match self.connector.connect().await {
                Ok(store) => store.ping().await.map(|()| store),
                Err(e) => Err(e),
            };
            match result {
                Ok(store) => return Some(store),
                Err(e) => {
                    warn!(
                        store = %self.connector.describe(),
                        attempt,
                        max_attempts = self.retries,
                        error = %e,
                        "store connection attempt failed"
                    );
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        None
    }

    /// The live handle, reconnecting if the previous one was dropped.
    pub async fn get_connection(&self) -> Option<Arc<dyn KvStore>> {
        let mut handle = self.handle.lock().await;
        if let Some(store) = handle.as_ref() {
            return Some(Arc::clone(store));
        }
        let store = self.open_with_retries().await?;
        info!(store = %self.connector.describe(), "store reconnected");
        *handle = Some(Arc::clone(&store));
        Some(store)
    }

    /// Ping the current handle. `false` when there is none or the ping fails.
    pub async fn health_check(&self) -> bool {
        let current = self.handle.lock().await.clone();
        match current {
            Some(store) => store.ping().await.is_ok(),
            None => false,
        }
    }

    /// A handle that just answered a ping. A failed ping drops the handle so
    /// the next call reconnects.
    pub async fn healthy_connection(&self) -> Option<Arc<dyn KvStore>> {
        let store = self.get_connection().await?;
        match store.ping().await {
            Ok(()) => Some(store),
            Err(e) => {
                warn!(error = %e, "store ping failed, dropping handle");
                let mut handle = self.handle.lock().await;
                if handle.as_ref().is_some_and(|h| Arc::ptr_eq(h, &store)) {
                    *handle = None;
                }
                None
            }
        }
    }

    /// Drop the current handle.
    pub async fn close(&self) {
        if self.handle.lock().await.take().is_some() {
            debug!("store handle closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use crate::memory::MemoryStore;

    /// Connector whose availability is toggled by the test.
    struct Switch {
        up: AtomicBool,
        attempts: AtomicU32,
        store: Arc<MemoryStore>,
    }

    impl Switch {
        fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(up),
                attempts: AtomicU32::new(0),
                store: Arc::new(MemoryStore::new()),
            })
        }
    }

    #[async_trait]
    impl StoreConnector for Switch {
        fn describe(&self) -> String {
            "switch".to_string()
        }

        async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                Ok(self.store.clone())
            } else {
                Err(ReplyqError::StoreUnavailable)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_retries_then_fails() {
        let switch = Switch::new(false);
        let result = StoreGateway::connect(switch.clone(), 3, Duration::from_millis(500)).await;
        assert!(matches!(result, Err(ReplyqError::StoreUnavailable)));
        assert_eq!(switch.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn connect_succeeds_when_up() {
        let gateway = StoreGateway::connect(Switch::new(true), 3, Duration::ZERO)
            .await
            .unwrap();
        assert!(gateway.health_check().await);
        assert!(gateway.healthy_connection().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn lazily_reconnects_after_close() {
        let switch = Switch::new(true);
        let gateway = StoreGateway::connect(switch.clone(), 2, Duration::from_millis(10))
            .await
            .unwrap();

        gateway.close().await;
        assert!(!gateway.health_check().await);

        switch.up.store(false, Ordering::SeqCst);
        assert!(gateway.get_connection().await.is_none());

        switch.up.store(true, Ordering::SeqCst);
        assert!(gateway.get_connection().await.is_some());
        assert!(gateway.health_check().await);
    }

    #[tokio::test]
    async fn disconnected_gateway_connects_on_first_use() {
        let switch = Switch::new(true);
        let gateway = StoreGateway::disconnected(switch.clone(), 1, Duration::ZERO);
        assert!(!gateway.health_check().await);
        assert_eq!(switch.attempts.load(Ordering::SeqCst), 0);
        assert!(gateway.healthy_connection().await.is_some());
        assert_eq!(switch.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memory_backend_from_config() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let gateway = StoreGateway::from_config(&config).await.unwrap();
        let store = gateway.healthy_connection().await.unwrap();
        store.set("k", "v").await.unwrap();
        let again = gateway.healthy_connection().await.unwrap();
        assert_eq!(again.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
