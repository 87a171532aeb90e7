// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job lifecycle over the shared store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use replyq_core::types::epoch_secs;
use replyq_core::{Job, JobId, JobPayload, JobStatus, KvStore, QueueStats, Registry, ReplyqError};
use replyq_store::StoreGateway;

/// Store key of a job document.
pub fn job_key(id: &JobId) -> String {
    format!("job:{id}")
}

/// A named queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    gateway: Arc<StoreGateway>,
    name: String,
}

impl JobQueue {
    pub fn new(gateway: Arc<StoreGateway>, name: impl Into<String>) -> Self {
        Self {
            gateway,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key of one of this queue's registries.
    pub fn registry_key(&self, registry: Registry) -> String {
        format!("queue:{}:{registry}", self.name)
    }

    async fn store(&self) -> Result<Arc<dyn KvStore>, ReplyqError> {
        self.gateway
            .get_connection()
            .await
            .ok_or(ReplyqError::StoreUnavailable)
    }

    /// Add a job to the queued registry. Returns its id.
    ///
    /// Fails with [`ReplyqError::StoreUnavailable`] when no store connection
    /// can be obtained, in which case nothing was written.
    pub async fn enqueue(&self, payload: JobPayload, priority: i32) -> Result<JobId, ReplyqError> {
        self.enqueue_at(payload, priority, Utc::now()).await
    }

    pub async fn enqueue_at(
        &self,
        payload: JobPayload,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Result<JobId, ReplyqError> {
        // A handle that no longer answers counts as unavailable here.
        let store = self
            .gateway
            .healthy_connection()
            .await
            .ok_or(ReplyqError::StoreUnavailable)?;
        let job = Job {
            id: JobId::generate(),
            payload,
            status: JobStatus::Queued,
            priority,
            enqueued_at: epoch_secs(now),
            started_at: None,
            completed_at: None,
            error: None,
        };
        store
            .set(&job_key(&job.id), &serde_json::to_string(&job)?)
            .await?;
        store
            .zadd(
                &self.registry_key(Registry::Queued),
                job.id.as_str(),
                job.enqueued_at,
            )
            .await?;
        debug!(queue = %self.name, job_id = %job.id, message_id = job.payload.message_id, "job enqueued");
        Ok(job.id)
    }

    /// Claim the oldest queued job and mark it started.
    ///
    /// The claim is a single pop-and-move, so a job is handed to at most one
    /// caller. A claimed id whose document is missing or unreadable is moved
    /// to the failed registry and the load error is returned.
    pub async fn dequeue(&self) -> Result<Option<Job>, ReplyqError> {
        let store = self.store().await?;
        let now = epoch_secs(Utc::now());
        let Some(id) = store
            .zset_pop_min_into(
                &self.registry_key(Registry::Queued),
                &self.registry_key(Registry::Started),
                now,
            )
            .await?
        else {
            return Ok(None);
        };
        let id = JobId(id);
        let key = job_key(&id);

        let mut job = match load_job(store.as_ref(), &key).await {
            Ok(job) => job,
            Err(e) => {
                warn!(queue = %self.name, job_id = %id, error = %e, "dropping unreadable job");
                store
                    .zset_move(
                        &self.registry_key(Registry::Started),
                        &self.registry_key(Registry::Failed),
                        id.as_str(),
                        now,
                    )
                    .await?;
                return Err(e);
            }
        };

        job.status = JobStatus::Started;
        job.started_at = Some(now);
        store.set(&key, &serde_json::to_string(&job)?).await?;
        Ok(Some(job))
    }

    /// Record that the pipeline is working on `job`.
    pub async fn mark_processing(&self, job: &mut Job) -> Result<(), ReplyqError> {
        self.transition(job, JobStatus::Processing, None).await
    }

    /// Finish `job` successfully and move it to the finished registry.
    pub async fn complete(&self, job: &mut Job) -> Result<(), ReplyqError> {
        self.transition(job, JobStatus::Completed, Some(Registry::Finished))
            .await
    }

    /// Fail `job` with `error` and move it to the failed registry. Failed jobs
    /// are not retried.
    pub async fn fail(&self, job: &mut Job, error: &str) -> Result<(), ReplyqError> {
        job.error = Some(error.to_string());
        self.transition(job, JobStatus::Failed, Some(Registry::Failed))
            .await
    }

    async fn transition(
        &self,
        job: &mut Job,
        next: JobStatus,
        registry: Option<Registry>,
    ) -> Result<(), ReplyqError> {
        if !job.status.can_transition_to(next) {
            return Err(ReplyqError::InvalidTransition {
                from: job.status.to_string(),
                to: next.to_string(),
            });
        }
        let store = self.store().await?;
        let now = epoch_secs(Utc::now());

        job.status = next;
        if next.is_terminal() {
            job.completed_at = Some(now);
        }
        store
            .set(&job_key(&job.id), &serde_json::to_string(job)?)
            .await?;

        if let Some(registry) = registry {
            let dst = self.registry_key(registry);
            let moved = store
                .zset_move(
                    &self.registry_key(Registry::Started),
                    &dst,
                    job.id.as_str(),
                    now,
                )
                .await?;
            if !moved {
                debug!(queue = %self.name, job_id = %job.id, "job was not in started registry");
                store.zadd(&dst, job.id.as_str(), now).await?;
            }
        }
        Ok(())
    }

    /// Sizes of all six registries.
    pub async fn counts(&self) -> Result<QueueStats, ReplyqError> {
        let store = self.store().await?;
        let mut counts = QueueStats::default();
        for registry in Registry::ALL {
            let n = store.zcard(&self.registry_key(registry)).await?;
            match registry {
                Registry::Queued => counts.queued = n,
                Registry::Started => counts.started = n,
                Registry::Finished => counts.finished = n,
                Registry::Failed => counts.failed = n,
                Registry::Deferred => counts.deferred = n,
                Registry::Scheduled => counts.scheduled = n,
            }
        }
        Ok(counts)
    }

    /// Load a job document by id.
    pub async fn get(&self, id: &JobId) -> Result<Option<Job>, ReplyqError> {
        let store = self.store().await?;
        match load_job(store.as_ref(), &job_key(id)).await {
            Ok(job) => Ok(Some(job)),
            Err(ReplyqError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn load_job(store: &dyn KvStore, key: &str) -> Result<Job, ReplyqError> {
    let raw = store.get(key).await?.ok_or_else(|| ReplyqError::NotFound {
        entity: "job".to_string(),
        id: key.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ReplyqError::MalformedRecord {
        key: key.to_string(),
        detail: e.to_string(),
    })
}
