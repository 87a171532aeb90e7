// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue for the Replyq pipeline.
//!
//! Jobs live in the shared store as JSON documents under `job:<id>`. Their ids
//! move through six sorted-set registries, `queue:<name>:<status>`, scored by
//! the time they entered that registry.

pub mod queue;

pub use queue::{JobQueue, job_key};
