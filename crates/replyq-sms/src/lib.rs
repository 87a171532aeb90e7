// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS surface for Replyq: Twilio delivery and the inbound webhook.

pub mod client;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

use replyq_config::model::SmsConfig;
use replyq_core::{OutboundSender, ReplyqError};
use tracing::warn;

pub use client::{DryRunSender, TwilioSender};
pub use signature::{compute_signature, verify_signature};
pub use webhook::{SignatureCheck, WebhookState, router, serve};

/// The sender implied by `[sms]`: Twilio when an account SID is set, a
/// logging dry-run sender otherwise.
pub fn sender_from_config(config: &SmsConfig) -> Result<Arc<dyn OutboundSender>, ReplyqError> {
    if config.account_sid.as_deref().is_none_or(str::is_empty) {
        warn!("sms.account_sid not set, replies will only be logged");
        return Ok(Arc::new(DryRunSender));
    }
    Ok(Arc::new(TwilioSender::new(config)?))
}
