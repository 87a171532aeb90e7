// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Replyq integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockResponder`] - Generative responder with pre-configured replies
//! - [`MockSender`] - Outbound sender that captures replies
//! - [`FlakyConnector`] - In-memory shared store that can be taken offline
//! - [`TestHarness`] - The full pipeline wired over the above

pub mod flaky;
pub mod harness;
pub mod mock_responder;
pub mod mock_sender;

pub use flaky::{FlakyConnector, FlakyStore};
pub use harness::{DEFAULT_FROM, SERVICE_NUMBER, TestHarness};
pub use mock_responder::MockResponder;
pub use mock_sender::{MockSender, SentMessage};
