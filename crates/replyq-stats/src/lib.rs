// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Throughput and latency tracking for Replyq.
//!
//! The [`StatsAggregator`] keeps three things in the shared store: a
//! retention-bounded history of queue snapshots, a single running processing
//! aggregate, and hourly volume counters. Every read degrades to defaults and
//! every write is skipped when the store is unavailable.

pub mod aggregator;
pub mod snapshot;
pub mod volume;

pub use aggregator::{HISTORY_KEY, PROCESSING_KEY, StatsAggregator, StatsSettings};
pub use snapshot::run_snapshot_loop;
