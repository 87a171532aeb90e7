// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound SMS webhook built on axum.
//!
//! Routes:
//! - `POST /webhook/sms`: Twilio form post, answered with empty TwiML
//! - `GET /health`: store reachability

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use replyq_config::model::{SmsConfig, WebhookConfig};
use replyq_core::{InboundMessage, ReplyqError};
use replyq_pipeline::Intake;
use replyq_store::StoreGateway;

use crate::signature::{SIGNATURE_HEADER, verify_signature};

/// TwiML body telling Twilio not to send anything itself.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// Credentials for checking `X-Twilio-Signature`.
#[derive(Clone)]
pub struct SignatureCheck {
    pub auth_token: String,
    /// URL Twilio posts to, as configured in the Twilio console.
    pub public_url: String,
}

impl std::fmt::Debug for SignatureCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCheck")
            .field("auth_token", &"[redacted]")
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl SignatureCheck {
    /// `Some` when validation is enabled and both token and URL are set.
    pub fn from_config(webhook: &WebhookConfig, sms: &SmsConfig) -> Option<Self> {
        if !webhook.validate_signature {
            return None;
        }
        Some(Self {
            auth_token: sms.auth_token.clone()?,
            public_url: webhook.public_url.clone()?,
        })
    }
}

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub intake: Intake,
    pub gateway: Arc<StoreGateway>,
    pub signature: Option<SignatureCheck>,
}

/// Query parameters accepted on the webhook URL.
#[derive(Debug, Default, Deserialize)]
pub struct SmsQuery {
    #[serde(default)]
    pub priority: i32,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: bool,
}

/// Build the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/sms", post(post_sms))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `cancel` fires.
pub async fn serve(
    config: &WebhookConfig,
    state: WebhookState,
    cancel: CancellationToken,
) -> Result<(), ReplyqError> {
    let ip: IpAddr = config.bind_address.parse().map_err(|e| {
        ReplyqError::Config(format!(
            "invalid webhook.bind_address `{}`: {e}",
            config.bind_address
        ))
    })?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ReplyqError::Internal(format!("failed to bind webhook to {addr}: {e}")))?;

    info!(%addr, signed = state.signature.is_some(), "webhook listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ReplyqError::Internal(format!("webhook server error: {e}")))?;

    info!("webhook stopped");
    Ok(())
}

fn field<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// POST /webhook/sms
///
/// Persists and queues the message, then answers with empty TwiML. The reply
/// is sent later by a worker.
pub async fn post_sms(
    State(state): State<WebhookState>,
    Query(query): Query<SmsQuery>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params: Vec<(String, String)> = match serde_urlencoded::from_bytes(&body) {
        Ok(params) => params,
        Err(e) => {
            debug!(error = %e, "unparseable webhook body");
            return (StatusCode::BAD_REQUEST, "malformed form body").into_response();
        }
    };

    if let Some(check) = &state.signature {
        let url = match uri.query() {
            Some(q) => format!("{}?{q}", check.public_url),
            None => check.public_url.clone(),
        };
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(&check.auth_token, &url, &params, provided) {
            warn!("webhook signature rejected");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let (Some(from), Some(to)) = (field(&params, "From"), field(&params, "To")) else {
        return (StatusCode::BAD_REQUEST, "missing From or To").into_response();
    };
    let inbound = InboundMessage {
        from: from.to_string(),
        to: to.to_string(),
        body: field(&params, "Body").unwrap_or_default().to_string(),
    };

    match state.intake.accept(inbound, query.priority).await {
        Ok(accepted) => {
            debug!(message_id = accepted.message_id, job_id = %accepted.job_id, "webhook accepted");
            (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
        }
        Err(e) => {
            warn!(error = %e, "webhook could not queue message");
            (StatusCode::SERVICE_UNAVAILABLE, "message could not be queued").into_response()
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<WebhookState>) -> Response {
    let store = state.gateway.healthy_connection().await.is_some();
    let (code, status) = if store {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            store,
        }),
    )
        .into_response()
}
