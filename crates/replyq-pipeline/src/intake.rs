// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accepting inbound messages: persist the record, then queue the job.

use std::sync::Arc;

use tracing::{error, info, warn};

use replyq_core::{InboundMessage, JobId, JobPayload, MessageRepository, ReplyqError};
use replyq_queue::JobQueue;

/// Identifiers assigned to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub message_id: i64,
    pub job_id: JobId,
}

#[derive(Clone)]
pub struct Intake {
    messages: Arc<dyn MessageRepository>,
    queue: JobQueue,
}

impl Intake {
    pub fn new(messages: Arc<dyn MessageRepository>, queue: JobQueue) -> Self {
        Self { messages, queue }
    }

    /// Store `inbound` as a pending record and enqueue a job for it.
    ///
    /// When the enqueue fails the record is marked failed with the error text
    /// and the error is returned.
    pub async fn accept(
        &self,
        inbound: InboundMessage,
        priority: i32,
    ) -> Result<Accepted, ReplyqError> {
        let message_id = self.messages.create_pending(&inbound).await?;
        let payload = JobPayload {
            message_id,
            from: inbound.from,
            to: inbound.to,
            body: inbound.body,
        };

        match self.queue.enqueue(payload, priority).await {
            Ok(job_id) => {
                info!(message_id, job_id = %job_id, "message accepted");
                Ok(Accepted { message_id, job_id })
            }
            Err(e) => {
                error!(message_id, error = %e, "failed to enqueue message");
                if let Err(mark) = self.messages.mark_failed(message_id, &e.to_string()).await {
                    warn!(message_id, error = %mark, "failed to mark message failed");
                }
                Err(e)
            }
        }
    }
}
