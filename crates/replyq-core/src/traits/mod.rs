// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Replyq pipeline.
//!
//! Every seam the pipeline talks through is a trait here, using
//! `#[async_trait]` for dynamic dispatch behind `Arc<dyn ...>`.

pub mod adapter;
pub mod channel;
pub mod provider;
pub mod storage;
pub mod store;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use channel::OutboundSender;
pub use provider::Responder;
pub use storage::{ChannelRepository, MessageRepository, TemplateRepository};
pub use store::{KvStore, ScoredMember};
