// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Replyq message pipeline.

use thiserror::Error;

/// The primary error type used across all Replyq components and collaborator traits.
#[derive(Debug, Error)]
pub enum ReplyqError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A store or database operation failed mid-flight (timeout, I/O, SQL error).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No connection to the shared store could be obtained.
    #[error("store unavailable")]
    StoreUnavailable,

    /// A stored record could not be decoded.
    #[error("malformed record at `{key}`: {detail}")]
    MalformedRecord { key: String, detail: String },

    /// The generative responder failed (timeout, API error, empty completion).
    #[error("responder error: {message}")]
    Responder {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The outbound sender failed to deliver a reply.
    #[error("send error: {message}")]
    Send {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A job status change that would move a job backwards.
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReplyqError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for store failures that a caller may degrade around.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::StoreUnavailable)
    }
}

impl From<serde_json::Error> for ReplyqError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("json serialization failed: {err}"))
    }
}
