// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live queue counts, snapshot history, and the processing aggregate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use replyq_config::model::StatsConfig;
use replyq_core::types::epoch_secs;
use replyq_core::{HourlyVolume, KvStore, ProcessingStats, QueueStats, StatsSnapshot};
use replyq_queue::JobQueue;
use replyq_store::StoreGateway;

use crate::volume::{HOURS_IN_VIEW, bucket_key, trailing_hours, volume_key};

/// Sorted set of JSON snapshots scored by timestamp.
pub const HISTORY_KEY: &str = "queue:history";

/// JSON document holding the running processing aggregate.
pub const PROCESSING_KEY: &str = "processing:stats";

/// Lost compare-and-swap rounds between contention log lines.
const CAS_CONTENTION_LOG_EVERY: u32 = 32;

/// Hourly volume counters expire after a day.
const VOLUME_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Tunables for the aggregator.
#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub retention: Duration,
    pub history_max_attempts: u32,
    pub history_retry_delay: Duration,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self::from(&StatsConfig::default())
    }
}

impl From<&StatsConfig> for StatsSettings {
    fn from(config: &StatsConfig) -> Self {
        Self {
            retention: Duration::from_secs(u64::from(config.retention_days) * 24 * 60 * 60),
            history_max_attempts: config.history_max_attempts.max(1),
            history_retry_delay: Duration::from_millis(config.history_retry_delay_ms),
        }
    }
}

/// Aggregates queue and processing statistics in the shared store.
pub struct StatsAggregator {
    gateway: Arc<StoreGateway>,
    queue: JobQueue,
    settings: StatsSettings,
}

impl StatsAggregator {
    pub fn new(gateway: Arc<StoreGateway>, queue: JobQueue, settings: StatsSettings) -> Self {
        Self {
            gateway,
            queue,
            settings,
        }
    }

    /// Current sizes of the six registries. All zeros when the store is
    /// unavailable or a count fails.
    pub async fn queue_stats(&self) -> QueueStats {
        if self.gateway.healthy_connection().await.is_none() {
            debug!("store unavailable, reporting empty queue stats");
            return QueueStats::default();
        }
        match self.queue.counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "failed to read queue counts");
                QueueStats::default()
            }
        }
    }

    /// Record a snapshot of the current queue counts and prune history older
    /// than the retention window. `None` when the store is unavailable.
    pub async fn record_snapshot(&self) -> Option<StatsSnapshot> {
        self.record_snapshot_at(Utc::now()).await
    }

    pub async fn record_snapshot_at(&self, now: DateTime<Utc>) -> Option<StatsSnapshot> {
        let Some(store) = self.gateway.healthy_connection().await else {
            warn!("store unavailable, skipping stats snapshot");
            return None;
        };

        let snapshot = StatsSnapshot {
            timestamp: epoch_secs(now),
            counts: self.queue_stats().await,
        };
        let member = match serde_json::to_string(&snapshot) {
            Ok(member) => member,
            Err(e) => {
                warn!(error = %e, "failed to encode stats snapshot");
                return None;
            }
        };

        if let Err(e) = store.zadd(HISTORY_KEY, &member, snapshot.timestamp).await {
            warn!(error = %e, "failed to record stats snapshot");
            return None;
        }

        let cutoff = snapshot.timestamp - self.settings.retention.as_secs_f64();
        match store
            .zrem_range_by_score(HISTORY_KEY, f64::NEG_INFINITY, cutoff)
            .await
        {
            Ok(pruned) if pruned > 0 => debug!(pruned, "pruned old stats snapshots"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to prune stats history"),
        }

        Some(snapshot)
    }

    /// Snapshots from the last `period_hours`, oldest first.
    ///
    /// Store errors are retried with a fixed delay; after the last attempt,
    /// or immediately when the store is unavailable, the result is empty.
    pub async fn history(&self, period_hours: u32) -> Vec<StatsSnapshot> {
        self.history_at(period_hours, Utc::now()).await
    }

    pub async fn history_at(&self, period_hours: u32, now: DateTime<Utc>) -> Vec<StatsSnapshot> {
        let max = epoch_secs(now);
        let min = max - f64::from(period_hours) * 3600.0;
        let attempts = self.settings.history_max_attempts;

        for attempt in 1..=attempts {
            let Some(store) = self.gateway.healthy_connection().await else {
                warn!("store unavailable, returning empty stats history");
                return Vec::new();
            };
            match store.zrange_by_score(HISTORY_KEY, min, max).await {
                Ok(members) => {
                    let mut snapshots: Vec<StatsSnapshot> = members
                        .into_iter()
                        .filter_map(|m| match serde_json::from_str(&m.member) {
                            Ok(snapshot) => Some(snapshot),
                            Err(e) => {
                                warn!(score = m.score, error = %e, "skipping malformed snapshot");
                                None
                            }
                        })
                        .collect();
                    snapshots.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
                    return snapshots;
                }
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "stats history query failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.history_retry_delay).await;
                    }
                }
            }
        }
        Vec::new()
    }

    /// The stored processing aggregate, or defaults. The hourly view is always
    /// rebuilt from the bucket counters so it ends at the current hour.
    pub async fn processing_stats(&self) -> ProcessingStats {
        self.processing_stats_at(Utc::now()).await
    }

    pub async fn processing_stats_at(&self, now: DateTime<Utc>) -> ProcessingStats {
        let Some(store) = self.gateway.healthy_connection().await else {
            return empty_stats(now);
        };
        let mut stats = match store.get(PROCESSING_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<ProcessingStats>(&raw) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(error = %e, "malformed processing stats, using defaults");
                    ProcessingStats::default()
                }
            },
            Ok(None) => ProcessingStats::default(),
            Err(e) => {
                warn!(error = %e, "failed to read processing stats");
                return empty_stats(now);
            }
        };
        stats.hourly_volume = hourly_view(store.as_ref(), now).await;
        stats
    }

    /// Fold one processed job into the aggregate and bump its hour bucket.
    ///
    /// Returns the aggregate that was written, or `None` when the update was
    /// skipped.
    pub async fn update_processing_stats(
        &self,
        duration: Duration,
        success: bool,
    ) -> Option<ProcessingStats> {
        self.update_processing_stats_at(duration, success, Utc::now())
            .await
    }

    pub async fn update_processing_stats_at(
        &self,
        duration: Duration,
        success: bool,
        now: DateTime<Utc>,
    ) -> Option<ProcessingStats> {
        let Some(store) = self.gateway.healthy_connection().await else {
            warn!("store unavailable, skipping processing stats update");
            return None;
        };

        if let Err(e) = store.incr(&volume_key(now), Some(VOLUME_TTL)).await {
            warn!(error = %e, "failed to bump hourly volume");
        }

        let mut lost_rounds = 0u32;
        loop {
            let raw = match store.get(PROCESSING_KEY).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "failed to read processing stats");
                    return None;
                }
            };
            let previous = match raw.as_deref().map(serde_json::from_str::<ProcessingStats>) {
                Some(Ok(stats)) => stats,
                Some(Err(e)) => {
                    warn!(error = %e, "overwriting malformed processing stats");
                    ProcessingStats::default()
                }
                None => ProcessingStats::default(),
            };

            let mut next = fold(&previous, duration.as_secs_f64(), success);
            // Read after the document so a winning write never carries an older view.
            next.hourly_volume = hourly_view(store.as_ref(), now).await;
            let encoded = match serde_json::to_string(&next) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(error = %e, "failed to encode processing stats");
                    return None;
                }
            };

            match store
                .compare_and_swap(PROCESSING_KEY, raw.as_deref(), &encoded)
                .await
            {
                Ok(true) => return Some(next),
                Ok(false) => {
                    lost_rounds += 1;
                    if lost_rounds % CAS_CONTENTION_LOG_EVERY == 0 {
                        debug!(lost_rounds, "processing stats update contended, retrying");
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to write processing stats");
                    return None;
                }
            }
        }
    }
}

/// The aggregate after one more job. Hourly volume is carried over unchanged.
pub fn fold(previous: &ProcessingStats, duration_secs: f64, success: bool) -> ProcessingStats {
    let total_prev = previous.total_processed;
    let total = total_prev + 1;
    let success_count = previous.successes() + u64::from(success);
    ProcessingStats {
        avg_processing_time: (previous.avg_processing_time * total_prev as f64 + duration_secs)
            / total as f64,
        total_processed: total,
        success_rate: 100.0 * success_count as f64 / total as f64,
        hourly_volume: previous.hourly_volume.clone(),
        success_count: Some(success_count),
    }
}

fn empty_stats(now: DateTime<Utc>) -> ProcessingStats {
    ProcessingStats {
        hourly_volume: trailing_hours(now)
            .into_iter()
            .map(|hour| HourlyVolume { hour, count: 0 })
            .collect(),
        ..ProcessingStats::default()
    }
}

async fn hourly_view(store: &dyn KvStore, now: DateTime<Utc>) -> Vec<HourlyVolume> {
    let mut view = Vec::with_capacity(HOURS_IN_VIEW);
    for hour in trailing_hours(now) {
        let key = bucket_key(&hour);
        let count = match store.get(&key).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                warn!(key = %key, "malformed volume counter");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                debug!(key = %key, error = %e, "failed to read volume counter");
                0
            }
        };
        view.push(HourlyVolume { hour, count });
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use replyq_core::{JobPayload, ReplyqError, ScoredMember};
    use replyq_store::{MemoryConnector, MemoryStore, StoreConnector};

    const DAY: i64 = 24 * 60 * 60;

    async fn aggregator_with(store: Arc<MemoryStore>, settings: StatsSettings) -> StatsAggregator {
        let gateway = Arc::new(
            StoreGateway::connect(Arc::new(MemoryConnector::new(store)), 1, Duration::ZERO)
                .await
                .unwrap(),
        );
        let queue = JobQueue::new(gateway.clone(), "default");
        StatsAggregator::new(gateway, queue, settings)
    }

    async fn aggregator() -> (StatsAggregator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            aggregator_with(store.clone(), StatsSettings::default()).await,
            store,
        )
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn queue_stats_reflect_registries() {
        let (stats, _) = aggregator().await;
        let payload = JobPayload {
            message_id: 1,
            from: "a".into(),
            to: "b".into(),
            body: "c".into(),
        };
        stats.queue.enqueue(payload.clone(), 0).await.unwrap();
        stats.queue.enqueue(payload, 0).await.unwrap();
        stats.queue.dequeue().await.unwrap();

        let counts = stats.queue_stats().await;
        assert_eq!((counts.queued, counts.started), (1, 1));
    }

    #[tokio::test]
    async fn history_prunes_snapshots_older_than_retention() {
        let (stats, _) = aggregator().await;
        let now = noon();
        for days_ago in [9, 8, 6, 1] {
            stats
                .record_snapshot_at(now - chrono::Duration::seconds(days_ago * DAY))
                .await
                .unwrap();
        }
        stats.record_snapshot_at(now).await.unwrap();

        let history = stats.history_at(24 * 30, now).await;
        let cutoff = epoch_secs(now) - 7.0 * DAY as f64;
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|s| s.timestamp > cutoff));
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn history_limits_to_period() {
        let (stats, _) = aggregator().await;
        let now = noon();
        stats
            .record_snapshot_at(now - chrono::Duration::hours(30))
            .await
            .unwrap();
        stats
            .record_snapshot_at(now - chrono::Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(stats.history_at(24, now).await.len(), 1);
        assert_eq!(stats.history_at(48, now).await.len(), 2);
    }

    #[tokio::test]
    async fn history_skips_malformed_entries() {
        let (stats, store) = aggregator().await;
        let now = noon();
        stats.record_snapshot_at(now).await.unwrap();
        store
            .zadd(HISTORY_KEY, "not json", epoch_secs(now) - 10.0)
            .await
            .unwrap();

        let history = stats.history_at(1, now).await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn average_and_success_rate() {
        let (stats, _) = aggregator().await;
        let now = noon();
        let runs = [(1.0, true), (2.0, true), (3.0, false), (6.0, true)];
        let mut last = None;
        for (secs, ok) in runs {
            last = stats
                .update_processing_stats_at(Duration::from_secs_f64(secs), ok, now)
                .await;
        }
        let last = last.unwrap();
        assert_eq!(last.total_processed, 4);
        assert!((last.avg_processing_time - 3.0).abs() < 1e-9);
        assert!((last.success_rate - 75.0).abs() < 0.01);
        assert_eq!(last.success_count, Some(3));

        let stored = stats.processing_stats_at(now).await;
        assert_eq!(stored, last);
    }

    #[tokio::test]
    async fn hourly_volume_has_24_consecutive_buckets() {
        let (stats, _) = aggregator().await;
        let now = noon();
        stats
            .update_processing_stats_at(Duration::from_secs(1), true, now - chrono::Duration::hours(3))
            .await
            .unwrap();
        stats
            .update_processing_stats_at(Duration::from_secs(1), true, now)
            .await
            .unwrap();
        let view = stats
            .update_processing_stats_at(Duration::from_secs(1), true, now)
            .await
            .unwrap()
            .hourly_volume;

        assert_eq!(view.len(), 24);
        let distinct: HashSet<_> = view.iter().map(|v| v.hour.as_str()).collect();
        assert_eq!(distinct.len(), 24);
        assert_eq!(view[23].hour, "2026-03-10-12");
        assert_eq!(view[23].count, 2);
        assert_eq!(view[20].hour, "2026-03-10-09");
        assert_eq!(view[20].count, 1);
        assert_eq!(view[0].hour, "2026-03-09-13");
    }

    #[tokio::test]
    async fn legacy_document_derives_success_count() {
        let (stats, store) = aggregator().await;
        store
            .set(
                PROCESSING_KEY,
                r#"{"avg_processing_time":2.0,"total_processed":3,"success_rate":66.666,"hourly_volume":[]}"#,
            )
            .await
            .unwrap();

        let next = stats
            .update_processing_stats_at(Duration::from_secs(2), true, noon())
            .await
            .unwrap();
        assert_eq!(next.success_count, Some(3));
        assert_eq!(next.total_processed, 4);
        assert!((next.success_rate - 75.0).abs() < 0.01);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_lose_nothing() {
        let (stats, _) = aggregator().await;
        let stats = Arc::new(stats);
        let now = noon();
        let mut handles = Vec::new();
        for i in 0..40 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                stats
                    .update_processing_stats_at(Duration::from_millis(100), i % 4 != 0, now)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        let result = stats.processing_stats_at(now).await;
        assert_eq!(result.total_processed, 40);
        assert_eq!(result.success_count, Some(30));
        assert!((result.success_rate - 75.0).abs() < 0.01);
        assert!((result.avg_processing_time - 0.1).abs() < 1e-6);
        assert_eq!(result.hourly_volume[23].count, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn heavy_contention_keeps_every_update() {
        let (stats, _) = aggregator().await;
        let stats = Arc::new(stats);
        let now = noon();
        let mut handles = Vec::new();
        for _ in 0..128 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                stats
                    .update_processing_stats_at(Duration::from_millis(10), true, now)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        let result = stats.processing_stats_at(now).await;
        assert_eq!(result.total_processed, 128);
        assert_eq!(result.success_count, Some(128));
        assert_eq!(result.hourly_volume[23].count, 128);
    }

    #[tokio::test]
    async fn read_view_ends_at_current_hour() {
        let (stats, _) = aggregator().await;
        let earlier = noon();
        stats
            .update_processing_stats_at(Duration::from_secs(1), true, earlier)
            .await
            .unwrap();

        let later = stats
            .processing_stats_at(earlier + chrono::Duration::hours(5))
            .await;
        assert_eq!(later.total_processed, 1);
        assert_eq!(later.hourly_volume.len(), 24);
        assert_eq!(later.hourly_volume[23].hour, "2026-03-10-17");
        assert_eq!(later.hourly_volume[23].count, 0);
        assert_eq!(later.hourly_volume[18].hour, "2026-03-10-12");
        assert_eq!(later.hourly_volume[18].count, 1);
    }

    #[tokio::test]
    async fn legacy_empty_view_is_rebuilt_on_read() {
        let (stats, store) = aggregator().await;
        store
            .set(
                PROCESSING_KEY,
                r#"{"avg_processing_time":2.0,"total_processed":3,"success_rate":100.0,"hourly_volume":[]}"#,
            )
            .await
            .unwrap();

        let read = stats.processing_stats_at(noon()).await;
        assert_eq!(read.total_processed, 3);
        assert_eq!(read.hourly_volume.len(), 24);
        assert_eq!(read.hourly_volume[23].hour, "2026-03-10-12");
    }

    #[tokio::test]
    async fn missing_document_yields_defaults_with_view() {
        let (stats, _) = aggregator().await;
        let defaults = stats.processing_stats_at(noon()).await;
        assert_eq!(defaults.total_processed, 0);
        assert_eq!(defaults.hourly_volume.len(), 24);
        assert!(defaults.hourly_volume.iter().all(|v| v.count == 0));
    }

    /// Store whose sorted-set reads always fail.
    struct BrokenRanges(MemoryStore);

    #[async_trait]
    impl KvStore for BrokenRanges {
        async fn ping(&self) -> Result<(), ReplyqError> {
            Ok(())
        }
        async fn get(&self, key: &str) -> Result<Option<String>, ReplyqError> {
            self.0.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), ReplyqError> {
            self.0.set(key, value).await
        }
        async fn delete(&self, key: &str) -> Result<bool, ReplyqError> {
            self.0.delete(key).await
        }
        async fn compare_and_swap(
            &self,
            key: &str,
            expected: Option<&str>,
            value: &str,
        ) -> Result<bool, ReplyqError> {
            self.0.compare_and_swap(key, expected, value).await
        }
        async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, ReplyqError> {
            self.0.incr(key, ttl).await
        }
        async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), ReplyqError> {
            self.0.zadd(key, member, score).await
        }
        async fn zrem(&self, key: &str, member: &str) -> Result<bool, ReplyqError> {
            self.0.zrem(key, member).await
        }
        async fn zcard(&self, key: &str) -> Result<u64, ReplyqError> {
            self.0.zcard(key).await
        }
        async fn zrange_by_score(
            &self,
            _key: &str,
            _min: f64,
            _max: f64,
        ) -> Result<Vec<ScoredMember>, ReplyqError> {
            Err(ReplyqError::storage(std::io::Error::other("read timed out")))
        }
        async fn zrem_range_by_score(
            &self,
            key: &str,
            min: f64,
            max: f64,
        ) -> Result<u64, ReplyqError> {
            self.0.zrem_range_by_score(key, min, max).await
        }
        async fn zset_move(
            &self,
            src: &str,
            dst: &str,
            member: &str,
            score: f64,
        ) -> Result<bool, ReplyqError> {
            self.0.zset_move(src, dst, member, score).await
        }
        async fn zset_pop_min_into(
            &self,
            src: &str,
            dst: &str,
            score: f64,
        ) -> Result<Option<String>, ReplyqError> {
            self.0.zset_pop_min_into(src, dst, score).await
        }
    }

    struct BrokenConnector(Arc<BrokenRanges>);

    #[async_trait]
    impl StoreConnector for BrokenConnector {
        fn describe(&self) -> String {
            "broken".to_string()
        }
        async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn history_retries_then_returns_empty() {
        let gateway = Arc::new(
            StoreGateway::connect(
                Arc::new(BrokenConnector(Arc::new(BrokenRanges(MemoryStore::new())))),
                1,
                Duration::ZERO,
            )
            .await
            .unwrap(),
        );
        let stats = StatsAggregator::new(
            gateway.clone(),
            JobQueue::new(gateway, "default"),
            StatsSettings::default(),
        );

        let started = tokio::time::Instant::now();
        assert!(stats.history(24).await.is_empty());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unavailable_store_degrades_everything() {
        struct Down;
        #[async_trait]
        impl StoreConnector for Down {
            fn describe(&self) -> String {
                "down".to_string()
            }
            async fn connect(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
                Err(ReplyqError::StoreUnavailable)
            }
        }

        let gateway = Arc::new(StoreGateway::disconnected(Arc::new(Down), 1, Duration::ZERO));
        let stats = StatsAggregator::new(
            gateway.clone(),
            JobQueue::new(gateway, "default"),
            StatsSettings::default(),
        );

        assert_eq!(stats.queue_stats().await, QueueStats::default());
        assert!(stats.record_snapshot().await.is_none());
        assert!(stats.history(24).await.is_empty());
        assert_eq!(stats.processing_stats().await.hourly_volume.len(), 24);
        assert!(
            stats
                .update_processing_stats(Duration::from_secs(1), true)
                .await
                .is_none()
        );
    }

    #[test]
    fn settings_from_config() {
        let settings = StatsSettings::default();
        assert_eq!(settings.retention, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(settings.history_max_attempts, 3);
        assert_eq!(settings.history_retry_delay, Duration::from_secs(1));
    }
}
