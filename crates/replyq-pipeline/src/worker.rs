// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker pool that drains the job queue.
//!
//! Each worker is an independent task looping over: health check, dequeue,
//! process. A job's failure is recorded on the job and its message record
//! and never stops the worker. While the store is unreachable workers stop
//! dequeuing and publish [`PoolStatus::Degraded`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use replyq_config::model::WorkerConfig;
use replyq_core::{
    Job, JobId, MessageCompletion, MessageRepository, OutboundSender, ReplyqError,
    SelectedChannel,
};
use replyq_queue::JobQueue;
use replyq_stats::StatsAggregator;
use replyq_store::StoreGateway;

use crate::resolver::{Resolution, ResponseResolver};
use crate::selector::ChannelSelector;

/// Health of the pool as seen by its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolStatus {
    Healthy,
    /// Workers are idling until the store comes back.
    Degraded(String),
}

/// What happened to one processed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        job_id: JobId,
        message_id: i64,
        template_id: Option<i64>,
        channel: String,
        elapsed: Duration,
    },
    Failed {
        job_id: JobId,
        message_id: i64,
        error: String,
        elapsed: Duration,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => job_id,
        }
    }
}

/// Pool sizing and pacing.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Everything a worker needs to take one job from dequeue to reply.
pub struct Pipeline {
    gateway: Arc<StoreGateway>,
    queue: JobQueue,
    resolver: ResponseResolver,
    selector: ChannelSelector,
    sender: Arc<dyn OutboundSender>,
    messages: Arc<dyn MessageRepository>,
    stats: Arc<StatsAggregator>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<StoreGateway>,
        queue: JobQueue,
        resolver: ResponseResolver,
        selector: ChannelSelector,
        sender: Arc<dyn OutboundSender>,
        messages: Arc<dyn MessageRepository>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            gateway,
            queue,
            resolver,
            selector,
            sender,
            messages,
            stats,
        }
    }

    async fn reply(&self, job: &mut Job) -> Result<(Resolution, SelectedChannel), ReplyqError> {
        self.queue.mark_processing(job).await?;
        let resolution = self.resolver.resolve(&job.payload.body).await?;
        let channel = self.selector.select_channel().await?;
        let provider_id = self
            .sender
            .send(&channel.address, &job.payload.from, &resolution.text)
            .await?;
        debug!(
            job_id = %job.id,
            provider_id = %provider_id,
            sender = self.sender.name(),
            "reply sent"
        );

        self.messages
            .mark_completed(
                job.payload.message_id,
                &MessageCompletion {
                    response: resolution.text.clone(),
                    template_id: resolution.template_id,
                    channel_used: channel.address.clone(),
                },
            )
            .await?;
        Ok((resolution, channel))
    }

    async fn process_job(&self, mut job: Job) -> JobOutcome {
        let started = Instant::now();
        let message_id = job.payload.message_id;

        match self.reply(&mut job).await {
            Ok((resolution, channel)) => {
                if let Err(e) = self.queue.complete(&mut job).await {
                    warn!(job_id = %job.id, error = %e, "failed to mark job completed");
                }
                let elapsed = started.elapsed();
                self.stats.update_processing_stats(elapsed, true).await;
                info!(
                    job_id = %job.id,
                    message_id,
                    template_id = ?resolution.template_id,
                    channel = %channel.address,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job completed"
                );
                JobOutcome::Completed {
                    job_id: job.id,
                    message_id,
                    template_id: resolution.template_id,
                    channel: channel.address,
                    elapsed,
                }
            }
            Err(e) => {
                let text = e.to_string();
                error!(job_id = %job.id, message_id, error = %text, "job failed");
                if let Err(mark) = self.messages.mark_failed(message_id, &text).await {
                    warn!(message_id, error = %mark, "failed to mark message failed");
                }
                if let Err(fail) = self.queue.fail(&mut job, &text).await {
                    warn!(job_id = %job.id, error = %fail, "failed to mark job failed");
                }
                let elapsed = started.elapsed();
                self.stats.update_processing_stats(elapsed, false).await;
                JobOutcome::Failed {
                    job_id: job.id,
                    message_id,
                    error: text,
                    elapsed,
                }
            }
        }
    }
}

/// A fixed number of workers sharing one [`Pipeline`].
pub struct WorkerPool {
    pipeline: Arc<Pipeline>,
    settings: WorkerSettings,
    status: watch::Sender<PoolStatus>,
}

impl WorkerPool {
    pub fn new(pipeline: Pipeline, settings: WorkerSettings) -> Self {
        let (status, _) = watch::channel(PoolStatus::Healthy);
        Self {
            pipeline: Arc::new(pipeline),
            settings,
            status,
        }
    }

    /// Subscribe to pool health changes.
    pub fn status(&self) -> watch::Receiver<PoolStatus> {
        self.status.subscribe()
    }

    /// Run `concurrency` workers until `cancel` fires, then wait for them.
    ///
    /// Jobs already being processed run to the end of their step sequence.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ReplyqError> {
        if self.settings.concurrency == 0 {
            return Err(ReplyqError::Config(
                "worker.concurrency must be at least 1".to_string(),
            ));
        }
        info!(
            workers = self.settings.concurrency,
            queue = self.pipeline.queue.name(),
            "worker pool starting"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.concurrency {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&self.pipeline),
                self.settings.poll_interval,
                self.status.clone(),
                cancel.clone(),
            ));
        }

        let mut processed = 0u64;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => processed += count,
                Err(e) => error!(error = %e, "worker task ended abnormally"),
            }
        }
        info!(processed, "worker pool stopped");
        Ok(())
    }

    /// Take one job through the pipeline. Never fails; the error is recorded
    /// on the job and its message record instead.
    pub async fn process_job(&self, job: Job) -> JobOutcome {
        self.pipeline.process_job(job).await
    }

    /// Dequeue and process a single job. `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, ReplyqError> {
        match self.pipeline.queue.dequeue().await? {
            Some(job) => Ok(Some(self.pipeline.process_job(job).await)),
            None => Ok(None),
        }
    }
}

/// Sleep for `period` unless cancelled first. Returns false on cancellation.
async fn idle(cancel: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

async fn worker_loop(
    worker_id: usize,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
    status: watch::Sender<PoolStatus>,
    cancel: CancellationToken,
) -> u64 {
    let mut processed = 0u64;
    debug!(worker_id, "worker started");

    while !cancel.is_cancelled() {
        if pipeline.gateway.healthy_connection().await.is_none() {
            let degraded = status.send_if_modified(|current| {
                if matches!(current, PoolStatus::Degraded(_)) {
                    return false;
                }
                *current = PoolStatus::Degraded("store unavailable".to_string());
                true
            });
            if degraded {
                warn!(worker_id, "store unavailable, pausing dequeue");
            }
            if !idle(&cancel, poll_interval).await {
                break;
            }
            continue;
        }

        let recovered = status.send_if_modified(|current| {
            if *current == PoolStatus::Healthy {
                return false;
            }
            *current = PoolStatus::Healthy;
            true
        });
        if recovered {
            info!(worker_id, "store reachable again, resuming dequeue");
        }

        match pipeline.queue.dequeue().await {
            Ok(Some(job)) => {
                pipeline.process_job(job).await;
                processed += 1;
            }
            Ok(None) => {
                if !idle(&cancel, poll_interval).await {
                    break;
                }
            }
            Err(e) => {
                warn!(worker_id, error = %e, "dequeue failed");
                if !idle(&cancel, poll_interval).await {
                    break;
                }
            }
        }
    }

    debug!(worker_id, processed, "worker stopped");
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use replyq_core::{HealthStatus, InboundMessage, KvStore, MessageStatus, PluginAdapter, Responder};
    use replyq_stats::StatsSettings;
    use replyq_store::queries::templates::insert_template;
    use replyq_store::{Database, MemoryConnector, SqliteRecords, StoreConnector};

    use crate::intake::Intake;

    struct Canned;

    #[async_trait]
    impl PluginAdapter for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl Responder for Canned {
        async fn generate(&self, prompt: &str) -> Result<String, ReplyqError> {
            if prompt.contains("boom") {
                return Err(ReplyqError::Responder {
                    message: "model unavailable".to_string(),
                    source: None,
                });
            }
            Ok("generated".to_string())
        }
    }

    #[derive(Default)]
    struct Outbox {
        broken: AtomicBool,
        sent: tokio::sync::Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl PluginAdapter for Outbox {
        fn name(&self) -> &str {
            "outbox"
        }

        async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl OutboundSender for Outbox {
        async fn send(&self, from: &str, to: &str, text: &str) -> Result<String, ReplyqError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(ReplyqError::Send {
                    message: "carrier rejected message".to_string(),
                    source: None,
                });
            }
            let mut sent = self.sent.lock().await;
            sent.push((from.to_string(), to.to_string(), text.to_string()));
            Ok(format!("SM{}", sent.len()))
        }
    }

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

    struct Fixture {
        records: SqliteRecords,
        queue: JobQueue,
        stats: Arc<StatsAggregator>,
        outbox: Arc<Outbox>,
        intake: Intake,
        pool: WorkerPool,
    }

    async fn fixture_with(gateway: Arc<StoreGateway>, concurrency: usize) -> Fixture {
        let records = SqliteRecords::new(Database::open_in_memory().await.unwrap());
        let queue = JobQueue::new(Arc::clone(&gateway), "test");
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&gateway),
            queue.clone(),
            StatsSettings::default(),
        ));
        let outbox = Arc::new(Outbox::default());
        let shared = Arc::new(records.clone());
        let pipeline = Pipeline::new(
            gateway,
            queue.clone(),
            ResponseResolver::new(shared.clone(), Arc::new(Canned)),
            ChannelSelector::new(shared.clone(), Some("+15550000000".to_string())),
            outbox.clone(),
            shared.clone(),
            Arc::clone(&stats),
        );
        let pool = WorkerPool::new(
            pipeline,
            WorkerSettings {
                concurrency,
                poll_interval: Duration::from_millis(10),
            },
        );
        Fixture {
            intake: Intake::new(shared, queue.clone()),
            records,
            queue,
            stats,
            outbox,
            pool,
        }
    }

    async fn fixture(concurrency: usize) -> Fixture {
        let gateway = StoreGateway::connect(Arc::new(MemoryConnector::default()), 1, Duration::ZERO)
            .await
            .unwrap();
        fixture_with(Arc::new(gateway), concurrency).await
    }

    fn inbound(body: &str) -> InboundMessage {
        InboundMessage {
            from: "+15551110000".to_string(),
            to: "+15552220000".to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn template_reply_completes_record_and_job() {
        let f = fixture(1).await;
        let template = insert_template(f.records.database(), &["hours"], "9 to 5")
            .await
            .unwrap();
        let accepted = f.intake.accept(inbound("what are your HOURS"), 0).await.unwrap();

        let outcome = f.pool.process_next().await.unwrap().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.job_id(), &accepted.job_id);

        let record = f.records.get_message(accepted.message_id).await.unwrap().unwrap();
        assert_eq!(record.status, MessageStatus::Completed);
        assert_eq!(record.response.as_deref(), Some("9 to 5"));
        assert_eq!(record.template_id, Some(template));
        assert_eq!(record.channel_used.as_deref(), Some("+15550000000"));
        assert!(record.processed_at.is_some());

        let sent = f.outbox.sent.lock().await.clone();
        assert_eq!(
            sent,
            vec![(
                "+15550000000".to_string(),
                "+15551110000".to_string(),
                "9 to 5".to_string()
            )]
        );

        let counts = f.queue.counts().await.unwrap();
        assert_eq!((counts.queued, counts.started, counts.finished), (0, 0, 1));
        let stats = f.stats.processing_stats().await;
        assert_eq!(stats.total_processed, 1);
        assert!((stats.success_rate - 100.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn send_failure_fails_job_and_record() {
        let f = fixture(1).await;
        f.outbox.broken.store(true, Ordering::SeqCst);
        let accepted = f.intake.accept(inbound("hello"), 0).await.unwrap();

        let outcome = f.pool.process_next().await.unwrap().unwrap();
        match outcome {
            JobOutcome::Failed { error, .. } => assert!(error.contains("carrier rejected")),
            other => panic!("expected failure, got {other:?}"),
        }

        let record = f.records.get_message(accepted.message_id).await.unwrap().unwrap();
        assert_eq!(record.status, MessageStatus::Failed);
        assert!(record.response.unwrap().contains("carrier rejected"));

        let job = f.queue.get(&accepted.job_id).await.unwrap().unwrap();
        assert!(job.error.unwrap().contains("carrier rejected"));
        assert_eq!(f.queue.counts().await.unwrap().failed, 1);

        let stats = f.stats.processing_stats().await;
        assert_eq!(stats.total_processed, 1);
        assert!(stats.success_rate.abs() < 0.01);
    }

    #[tokio::test]
    async fn responder_failure_fails_job() {
        let f = fixture(1).await;
        let accepted = f.intake.accept(inbound("boom"), 0).await.unwrap();
        let outcome = f.pool.process_next().await.unwrap().unwrap();
        assert!(!outcome.is_success());
        let record = f.records.get_message(accepted.message_id).await.unwrap().unwrap();
        assert_eq!(record.status, MessageStatus::Failed);
        assert!(f.outbox.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_yields_nothing() {
        let f = fixture(1).await;
        assert!(f.pool.process_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pool_drains_queue_and_survives_failures() {
        let f = fixture(3).await;
        for body in ["one", "boom", "two", "three", "boom again"] {
            f.intake.accept(inbound(body), 0).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let pool = Arc::new(f.pool);
        let runner = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let counts = f.queue.counts().await.unwrap();
            if counts.finished + counts.failed == 5 {
                assert_eq!((counts.finished, counts.failed), (3, 2));
                break;
            }
            assert!(Instant::now() < deadline, "pool did not drain: {counts:?}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        runner.await.unwrap().unwrap();
        assert_eq!(f.outbox.sent.lock().await.len(), 3);
        assert_eq!(f.stats.processing_stats().await.total_processed, 5);
    }

    #[tokio::test]
    async fn unreachable_store_degrades_pool() {
        let gateway = StoreGateway::disconnected(Arc::new(Down), 1, Duration::ZERO);
        let f = fixture_with(Arc::new(gateway), 2).await;
        let mut status = f.pool.status();

        let cancel = CancellationToken::new();
        let pool = Arc::new(f.pool);
        let runner = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| matches!(s, PoolStatus::Degraded(_))),
        )
        .await
        .unwrap()
        .unwrap();

        cancel.cancel();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let f = fixture(0).await;
        let err = f.pool.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReplyqError::Config(_)));
    }
}
