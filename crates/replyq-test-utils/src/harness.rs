// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete pipeline with mock collaborators,
//! a temp SQLite record database, and a switchable in-memory shared store.
//! `send_message()` drives the intake side and `process_next()` the worker
//! side.

use std::sync::Arc;
use std::time::Duration;

use replyq_core::{InboundMessage, ReplyqError};
use replyq_pipeline::{
    Accepted, ChannelSelector, Intake, JobOutcome, Pipeline, ResponseResolver, WorkerPool,
    WorkerSettings,
};
use replyq_queue::JobQueue;
use replyq_stats::{StatsAggregator, StatsSettings};
use replyq_store::queries::channels::{NewChannel, insert_channel};
use replyq_store::queries::templates::insert_template;
use replyq_store::{Database, SqliteRecords, StoreGateway};

use crate::flaky::FlakyConnector;
use crate::mock_responder::MockResponder;
use crate::mock_sender::MockSender;

/// Address every harness message is sent to.
pub const SERVICE_NUMBER: &str = "+15552220000";

/// Identity used when no channel is available.
pub const DEFAULT_FROM: &str = "+15550000000";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<String>,
    concurrency: usize,
    default_from: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            concurrency: 2,
            default_from: Some(DEFAULT_FROM.to_string()),
        }
    }

    /// Set mock responder replies.
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Remove the fallback sending identity.
    pub fn without_default_from(mut self) -> Self {
        self.default_from = None;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ReplyqError> {
        let temp_dir = tempfile::TempDir::new().map_err(ReplyqError::storage)?;
        let db_path = temp_dir.path().join("replyq-test.db");
        let database = Database::open(&db_path.to_string_lossy(), true).await?;
        let records = SqliteRecords::new(database);

        let connector = FlakyConnector::new();
        let gateway = Arc::new(
            StoreGateway::connect(Arc::new(connector.clone()), 1, Duration::ZERO).await?,
        );
        let queue = JobQueue::new(Arc::clone(&gateway), "test");
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&gateway),
            queue.clone(),
            StatsSettings {
                history_retry_delay: Duration::from_millis(10),
                ..StatsSettings::default()
            },
        ));

        let responder = Arc::new(MockResponder::with_replies(self.replies));
        let sender = Arc::new(MockSender::new());
        let shared = Arc::new(records.clone());

        let pipeline = Pipeline::new(
            Arc::clone(&gateway),
            queue.clone(),
            ResponseResolver::new(shared.clone(), responder.clone()),
            ChannelSelector::new(shared.clone(), self.default_from),
            sender.clone(),
            shared.clone(),
            Arc::clone(&stats),
        );
        let pool = Arc::new(WorkerPool::new(
            pipeline,
            WorkerSettings {
                concurrency: self.concurrency,
                poll_interval: Duration::from_millis(10),
            },
        ));

        Ok(TestHarness {
            intake: Intake::new(shared, queue.clone()),
            records,
            connector,
            gateway,
            queue,
            stats,
            responder,
            sender,
            pool,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub records: SqliteRecords,
    /// Switch for the shared store.
    pub connector: FlakyConnector,
    pub gateway: Arc<StoreGateway>,
    pub queue: JobQueue,
    pub stats: Arc<StatsAggregator>,
    pub responder: Arc<MockResponder>,
    pub sender: Arc<MockSender>,
    pub intake: Intake,
    pub pool: Arc<WorkerPool>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, ReplyqError> {
        Self::builder().build().await
    }

    /// Accept an inbound message from `from` to [`SERVICE_NUMBER`].
    pub async fn send_message(&self, from: &str, body: &str) -> Result<Accepted, ReplyqError> {
        self.intake
            .accept(
                InboundMessage {
                    from: from.to_string(),
                    to: SERVICE_NUMBER.to_string(),
                    body: body.to_string(),
                },
                0,
            )
            .await
    }

    /// Run one job through the pipeline.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, ReplyqError> {
        self.pool.process_next().await
    }

    pub async fn add_template(&self, keywords: &[&str], response: &str) -> Result<i64, ReplyqError> {
        insert_template(self.records.database(), keywords, response).await
    }

    pub async fn add_channel(
        &self,
        address: &str,
        priority: i32,
        daily_limit: Option<i64>,
    ) -> Result<i64, ReplyqError> {
        insert_channel(
            self.records.database(),
            &NewChannel {
                name: address.to_string(),
                address: address.to_string(),
                priority,
                is_active: true,
                daily_limit,
            },
        )
        .await
    }

    /// Take the shared store offline.
    pub fn store_down(&self) {
        self.connector.set_down(true);
    }

    pub fn store_up(&self) {
        self.connector.set_down(false);
    }
}
