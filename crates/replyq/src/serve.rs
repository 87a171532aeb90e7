// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `replyq serve` and `replyq worker` command implementations.
//!
//! [`Services`] is the composition root: it opens the record database and the
//! shared store and wires the queue, statistics, intake and channel selection
//! over them. The worker pool, which needs the outbound collaborators, is
//! built on demand so the one-shot commands run without credentials.

use std::sync::Arc;
use std::time::Duration;

use replyq_config::ReplyqConfig;
use replyq_core::{HealthStatus, PluginAdapter, ReplyqError};
use replyq_openai::OpenAiResponder;
use replyq_pipeline::shutdown;
use replyq_pipeline::{
    ChannelSelector, Intake, Pipeline, PoolStatus, ResponseResolver, WorkerPool, WorkerSettings,
};
use replyq_queue::JobQueue;
use replyq_sms::{SignatureCheck, WebhookState};
use replyq_stats::{StatsAggregator, StatsSettings, run_snapshot_loop};
use replyq_store::{Database, SqliteRecords, StoreGateway};
use tracing::{info, warn};

use crate::schedule;

/// How long background tasks get to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Shared handles every command works against.
pub struct Services {
    pub gateway: Arc<StoreGateway>,
    pub records: Arc<SqliteRecords>,
    pub queue: JobQueue,
    pub stats: Arc<StatsAggregator>,
    pub intake: Intake,
    pub selector: ChannelSelector,
}

impl Services {
    /// Open storage and wire the store-backed components.
    ///
    /// Fails when the record database cannot be opened or the shared store
    /// cannot be reached within `store.connect_retries` attempts.
    pub async fn open(config: &ReplyqConfig) -> Result<Self, ReplyqError> {
        let database = Database::open(&config.database.path, config.database.wal_mode).await?;
        let records = Arc::new(SqliteRecords::new(database));

        let gateway = Arc::new(StoreGateway::from_config(&config.store).await?);
        let queue = JobQueue::new(Arc::clone(&gateway), config.worker.queue_name.clone());
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&gateway),
            queue.clone(),
            StatsSettings::from(&config.stats),
        ));

        Ok(Self {
            intake: Intake::new(records.clone(), queue.clone()),
            selector: ChannelSelector::new(records.clone(), config.sms.default_from.clone()),
            gateway,
            records,
            queue,
            stats,
        })
    }

    /// Build the worker pool with the configured responder and sender.
    ///
    /// Each collaborator is health-checked once and the result logged, so a
    /// dry-run sender or an unreachable database shows up at startup.
    pub async fn worker_pool(&self, config: &ReplyqConfig) -> Result<WorkerPool, ReplyqError> {
        let responder = Arc::new(OpenAiResponder::new(&config.openai)?);
        let sender = replyq_sms::sender_from_config(&config.sms)?;

        log_health(responder.name(), responder.health_check().await);
        log_health(sender.name(), sender.health_check().await);
        log_health(self.records.name(), self.records.health_check().await);

        let pipeline = Pipeline::new(
            Arc::clone(&self.gateway),
            self.queue.clone(),
            ResponseResolver::new(self.records.clone(), responder),
            self.selector.clone(),
            sender,
            self.records.clone(),
            Arc::clone(&self.stats),
        );
        Ok(WorkerPool::new(
            pipeline,
            WorkerSettings::from(&config.worker),
        ))
    }

    pub fn webhook_state(&self, config: &ReplyqConfig) -> WebhookState {
        let signature = SignatureCheck::from_config(&config.webhook, &config.sms);
        if config.webhook.validate_signature && signature.is_none() {
            warn!("webhook.validate_signature is set but sms.auth_token or webhook.public_url is missing");
        }
        WebhookState {
            intake: self.intake.clone(),
            gateway: Arc::clone(&self.gateway),
            signature,
        }
    }
}

/// Log one adapter health result. A failed check counts as unhealthy.
fn log_health(adapter: &str, result: Result<HealthStatus, ReplyqError>) -> HealthStatus {
    let status = result.unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    match &status {
        HealthStatus::Healthy => info!(adapter, "adapter healthy"),
        HealthStatus::Degraded(reason) => warn!(adapter, reason = reason.as_str(), "adapter degraded"),
        HealthStatus::Unhealthy(reason) => warn!(adapter, reason = reason.as_str(), "adapter unhealthy"),
    }
    status
}

/// Log every change of the pool's health until the channel closes.
async fn watch_pool_status(mut status: tokio::sync::watch::Receiver<PoolStatus>) {
    while status.changed().await.is_ok() {
        match &*status.borrow_and_update() {
            PoolStatus::Healthy => info!("worker pool healthy"),
            PoolStatus::Degraded(reason) => warn!(reason = reason.as_str(), "worker pool degraded"),
        }
    }
}

/// Runs the `replyq serve` command.
///
/// Starts the worker pool, the snapshot task, the midnight channel reset and
/// the webhook. Everything stops when SIGTERM or Ctrl+C arrives.
pub async fn run_serve(config: ReplyqConfig) -> Result<(), ReplyqError> {
    info!("starting replyq serve");

    let services = Services::open(&config).await?;
    let pool = Arc::new(services.worker_pool(&config).await?);
    let cancel = shutdown::install_signal_handler();

    tokio::spawn(watch_pool_status(pool.status()));

    let workers = {
        let pool = Arc::clone(&pool);
        let cancel = cancel.clone();
        tokio::spawn(async move { pool.run(cancel).await })
    };
    let snapshots = tokio::spawn(run_snapshot_loop(
        Arc::clone(&services.stats),
        Duration::from_secs(config.stats.snapshot_interval_secs),
        cancel.clone(),
    ));
    let resets = tokio::spawn(schedule::run_daily_reset(
        services.selector.clone(),
        cancel.clone(),
    ));
    info!(
        concurrency = config.worker.concurrency,
        snapshot_interval_secs = config.stats.snapshot_interval_secs,
        "background tasks started"
    );

    let served = replyq_sms::serve(&config.webhook, services.webhook_state(&config), cancel.clone()).await;
    if served.is_err() {
        // The webhook could not start; take the rest down with it.
        cancel.cancel();
    }

    let workers_result = shutdown_tasks(workers, snapshots, resets).await;
    services.gateway.close().await;

    served?;
    workers_result?;
    info!("replyq serve shutdown complete");
    Ok(())
}

/// Runs the `replyq worker` command: the pool without the webhook.
pub async fn run_worker(config: ReplyqConfig) -> Result<(), ReplyqError> {
    info!("starting replyq worker");

    let services = Services::open(&config).await?;
    let pool = services.worker_pool(&config).await?;
    let cancel = shutdown::install_signal_handler();

    tokio::spawn(watch_pool_status(pool.status()));
    let result = pool.run(cancel).await;
    services.gateway.close().await;

    result?;
    info!("replyq worker shutdown complete");
    Ok(())
}

async fn shutdown_tasks(
    workers: tokio::task::JoinHandle<Result<(), ReplyqError>>,
    snapshots: tokio::task::JoinHandle<u64>,
    resets: tokio::task::JoinHandle<u64>,
) -> Result<(), ReplyqError> {
    let mut workers_result = Ok(());
    let drained = shutdown::drain(
        "workers",
        async {
            workers_result = match workers.await {
                Ok(result) => result,
                Err(e) => Err(ReplyqError::Internal(format!("worker pool task failed: {e}"))),
            };
        },
        SHUTDOWN_GRACE,
    )
    .await;
    if !drained {
        warn!("worker pool did not stop within the grace period");
    }

    shutdown::drain("snapshots", snapshots, SHUTDOWN_GRACE).await;
    shutdown::drain("channel-reset", resets, SHUTDOWN_GRACE).await;
    workers_result
}

/// Defaults over an in-memory store and a database file inside `dir`.
#[cfg(test)]
pub(crate) fn memory_config(dir: &tempfile::TempDir) -> ReplyqConfig {
    let mut config = ReplyqConfig::default();
    config.store.backend = replyq_config::StoreBackend::Memory;
    config.database.path = dir.path().join("replyq.db").to_string_lossy().into_owned();
    config
}
