// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value store trait for the shared volatile store.
//!
//! The primitive set mirrors what the queue and stats aggregator need from a
//! Redis-style store: strings with optional expiry, atomic counters,
//! compare-and-swap, and sorted sets. Every method is atomic with respect to
//! every other call on the same store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ReplyqError;

/// A sorted-set member with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Shared volatile key/value store.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), ReplyqError>;

    /// Reads a string key. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, ReplyqError>;

    /// Writes a string key, clearing any expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), ReplyqError>;

    /// Removes a key of any type. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, ReplyqError>;

    /// Writes `value` only if the current value equals `expected`
    /// (`None` meaning the key is absent). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, ReplyqError>;

    /// Atomically increments an integer key, creating it at 1. `ttl` applies
    /// only when the key is created.
    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, ReplyqError>;

    /// Adds or re-scores a sorted-set member.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), ReplyqError>;

    /// Removes a sorted-set member. Returns whether it was present.
    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ReplyqError>;

    /// Number of members in a sorted set.
    async fn zcard(&self, key: &str) -> Result<u64, ReplyqError>;

    /// Members with `min <= score <= max`, ascending by score.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>, ReplyqError>;

    /// Removes members with `min <= score <= max`. Returns how many were removed.
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64)
    -> Result<u64, ReplyqError>;

    /// Moves `member` from `src` to `dst` with a new score. Returns false when
    /// `member` was not in `src`.
    async fn zset_move(
        &self,
        src: &str,
        dst: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, ReplyqError>;

    /// Pops the lowest-scored member of `src` and adds it to `dst` with `score`,
    /// as one atomic step.
    async fn zset_pop_min_into(
        &self,
        src: &str,
        dst: &str,
        score: f64,
    ) -> Result<Option<String>, ReplyqError>;
}
