// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply text resolution: keyword templates first, the generative responder
//! otherwise.

use std::sync::Arc;

use tracing::{debug, warn};

use replyq_core::{ReplyqError, Responder, TemplateRepository};

/// The reply chosen for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    /// Set when a template produced the text.
    pub template_id: Option<i64>,
}

pub struct ResponseResolver {
    templates: Arc<dyn TemplateRepository>,
    responder: Arc<dyn Responder>,
}

impl ResponseResolver {
    pub fn new(templates: Arc<dyn TemplateRepository>, responder: Arc<dyn Responder>) -> Self {
        Self {
            templates,
            responder,
        }
    }

    /// Resolve the reply for `body`.
    ///
    /// Active templates are scanned in creation order and the first whose
    /// keyword occurs in the body wins; its usage counter is bumped. With no
    /// match the raw body goes to the responder and its text is returned as is.
    pub async fn resolve(&self, body: &str) -> Result<Resolution, ReplyqError> {
        let templates = self.templates.active_templates().await?;
        if let Some(template) = templates.into_iter().find(|t| t.matches(body)) {
            debug!(template_id = template.id, "template matched");
            if let Err(e) = self.templates.increment_usage(template.id).await {
                warn!(template_id = template.id, error = %e, "failed to record template usage");
            }
            return Ok(Resolution {
                text: template.response,
                template_id: Some(template.id),
            });
        }

        debug!(responder = self.responder.name(), "no template matched, generating reply");
        let text = self.responder.generate(body).await?;
        Ok(Resolution {
            text,
            template_id: None,
        })
    }
}
