// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message processing pipeline for Replyq.
//!
//! An inbound message enters through [`Intake`], which persists it and queues
//! a job. The [`WorkerPool`] drains the queue: each job's reply text comes
//! from the [`ResponseResolver`], its outbound identity from the
//! [`ChannelSelector`], and the outcome is written back to the record, the
//! queue and the processing aggregate.

pub mod intake;
pub mod resolver;
pub mod selector;
pub mod shutdown;
pub mod worker;

pub use intake::{Accepted, Intake};
pub use resolver::{Resolution, ResponseResolver};
pub use selector::ChannelSelector;
pub use worker::{JobOutcome, Pipeline, PoolStatus, WorkerPool, WorkerSettings};
