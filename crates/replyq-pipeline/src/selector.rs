// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound identity selection.

use std::sync::Arc;

use tracing::{debug, info, warn};

use replyq_core::{ChannelRepository, ReplyqError, SelectedChannel};

/// Picks the channel each reply is sent from.
///
/// The claim itself (read, pick, increment) is delegated to the repository,
/// which performs it in one transaction.
#[derive(Clone)]
pub struct ChannelSelector {
    channels: Arc<dyn ChannelRepository>,
    default_from: Option<String>,
}

impl ChannelSelector {
    pub fn new(channels: Arc<dyn ChannelRepository>, default_from: Option<String>) -> Self {
        Self {
            channels,
            default_from,
        }
    }

    /// Claim the best active channel with capacity left today.
    ///
    /// Falls back to the configured default identity, without a channel id,
    /// when no channel qualifies. Fails with [`ReplyqError::NotFound`] when
    /// there is no default either.
    pub async fn select_channel(&self) -> Result<SelectedChannel, ReplyqError> {
        if let Some(channel) = self.channels.claim_channel().await? {
            debug!(
                channel_id = channel.id,
                address = %channel.address,
                daily_message_count = channel.daily_message_count,
                "channel claimed"
            );
            return Ok(channel.into());
        }

        match &self.default_from {
            Some(address) => {
                debug!(address = %address, "no channel available, using default identity");
                Ok(SelectedChannel {
                    channel_id: None,
                    address: address.clone(),
                })
            }
            None => {
                warn!("no channel available and no default identity configured");
                Err(ReplyqError::NotFound {
                    entity: "channel".to_string(),
                    id: "active channel with capacity".to_string(),
                })
            }
        }
    }

    /// Zero every channel's daily counter. Safe to call repeatedly.
    pub async fn reset_daily_counts(&self) -> Result<u64, ReplyqError> {
        let reset = self.channels.reset_daily_counts().await?;
        info!(channels = reset, "daily channel counts reset");
        Ok(reset)
    }
}
