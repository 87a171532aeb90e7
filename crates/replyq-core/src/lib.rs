// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Replyq message pipeline.
//!
//! This crate provides the domain types, the error taxonomy, and the
//! collaborator traits every other Replyq crate is written against. Store
//! backends, repositories, and provider clients implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ReplyqError;
pub use types::{
    Channel, HealthStatus, HourlyVolume, InboundMessage, Job, JobId, JobPayload, JobStatus,
    MessageCompletion, MessageRecord, MessageStatus, ProcessingStats, QueueStats, Registry,
    SelectedChannel, StatsSnapshot, Template,
};

// Re-export all collaborator traits at crate root.
pub use traits::{
    ChannelRepository, KvStore, MessageRepository, OutboundSender, PluginAdapter, Responder,
    ScoredMember, TemplateRepository,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replyq_error_has_all_variants() {
        let _config = ReplyqError::Config("test".into());
        let _storage = ReplyqError::storage(std::io::Error::other("test"));
        let _unavailable = ReplyqError::StoreUnavailable;
        let _malformed = ReplyqError::MalformedRecord {
            key: "queue:history".into(),
            detail: "not json".into(),
        };
        let _responder = ReplyqError::Responder {
            message: "test".into(),
            source: None,
        };
        let _send = ReplyqError::Send {
            message: "test".into(),
            source: None,
        };
        let _not_found = ReplyqError::NotFound {
            entity: "message".into(),
            id: "1".into(),
        };
        let _transition = ReplyqError::InvalidTransition {
            from: "completed".into(),
            to: "queued".into(),
        };
        let _timeout = ReplyqError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ReplyqError::Internal("test".into());
    }

    #[test]
    fn store_failures_are_classified() {
        assert!(ReplyqError::StoreUnavailable.is_store_failure());
        assert!(ReplyqError::storage(std::io::Error::other("reset")).is_store_failure());
        assert!(!ReplyqError::Internal("x".into()).is_store_failure());
    }

    #[test]
    fn error_messages_render() {
        let err = ReplyqError::Send {
            message: "twilio returned 400".into(),
            source: None,
        };
        assert_eq!(err.to_string(), "send error: twilio returned 400");
        assert_eq!(ReplyqError::StoreUnavailable.to_string(), "store unavailable");
    }

    #[test]
    fn all_traits_are_exported() {
        // Compile-time check that every collaborator trait is reachable
        // and object safe.
        fn _kv(_: &dyn KvStore) {}
        fn _responder(_: &dyn Responder) {}
        fn _sender(_: &dyn OutboundSender) {}
        fn _messages(_: &dyn MessageRepository) {}
        fn _channels(_: &dyn ChannelRepository) {}
        fn _templates(_: &dyn TemplateRepository) {}
    }
}
