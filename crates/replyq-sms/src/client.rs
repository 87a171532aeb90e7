// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery through the Twilio Messages API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use replyq_config::model::SmsConfig;
use replyq_core::{HealthStatus, OutboundSender, PluginAdapter, ReplyqError};

/// Subset of the Message resource returned on create.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

/// Twilio error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Sends replies as SMS via Twilio.
#[derive(Debug, Clone)]
pub struct TwilioSender {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
}

impl TwilioSender {
    /// Creates a sender from the `[sms]` section. Requires both
    /// `account_sid` and `auth_token`.
    pub fn new(config: &SmsConfig) -> Result<Self, ReplyqError> {
        let account_sid = config
            .account_sid
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReplyqError::Config("sms.account_sid is not set".to_string()))?;
        let auth_token = config
            .auth_token
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReplyqError::Config("sms.auth_token is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReplyqError::Send {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(account_sid = %account_sid, "Twilio sender initialized");
        Ok(Self {
            client,
            account_sid,
            auth_token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl PluginAdapter for TwilioSender {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl OutboundSender for TwilioSender {
    async fn send(&self, from: &str, to: &str, text: &str) -> Result<String, ReplyqError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", from), ("To", to), ("Body", text)])
            .send()
            .await
            .map_err(|e| ReplyqError::Send {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => match err.code {
                    Some(code) => format!("Twilio error {code}: {}", err.message),
                    None => format!("Twilio error: {}", err.message),
                },
                Err(_) => format!("Twilio returned {status}: {body}"),
            };
            warn!(status = %status, to = %to, "message rejected");
            return Err(ReplyqError::Send {
                message,
                source: None,
            });
        }

        let resource: MessageResource =
            serde_json::from_str(&body).map_err(|e| ReplyqError::Send {
                message: format!("failed to parse Twilio response: {e}"),
                source: Some(Box::new(e)),
            })?;
        debug!(sid = %resource.sid, status = ?resource.status, to = %to, "message queued by Twilio");
        Ok(resource.sid)
    }
}

/// Logs replies instead of sending them. Used when no Twilio account is
/// configured.
#[derive(Debug, Default, Clone)]
pub struct DryRunSender;

#[async_trait]
impl PluginAdapter for DryRunSender {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplyqError> {
        Ok(HealthStatus::Degraded(
            "no Twilio account configured, replies are only logged".to_string(),
        ))
    }
}

#[async_trait]
impl OutboundSender for DryRunSender {
    async fn send(&self, from: &str, to: &str, text: &str) -> Result<String, ReplyqError> {
        let id = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(id = %id, from = %from, to = %to, text = %text, "reply not sent (dry run)");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: &str) -> SmsConfig {
        SmsConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("token".to_string()),
            default_from: None,
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn requires_credentials() {
        let err = TwilioSender::new(&SmsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("account_sid"));

        let mut partial = config("https://api.twilio.com");
        partial.auth_token = None;
        assert!(TwilioSender::new(&partial).is_err());
    }

    #[test]
    fn messages_url_uses_account() {
        let sender = TwilioSender::new(&config("https://api.twilio.com/")).unwrap();
        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn send_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            // base64("AC123:token")
            .and(header("authorization", "Basic QUMxMjM6dG9rZW4="))
            .and(body_string_contains("From=%2B15550000000"))
            .and(body_string_contains("To=%2B15551110000"))
            .and(body_string_contains("Body=hi+there"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM0001",
                "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = TwilioSender::new(&config(&server.uri())).unwrap();
        let sid = sender
            .send("+15550000000", "+15551110000", "hi there")
            .await
            .unwrap();
        assert_eq!(sid, "SM0001");
    }

    #[tokio::test]
    async fn rejection_is_a_send_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let sender = TwilioSender::new(&config(&server.uri())).unwrap();
        let err = sender.send("+1555", "bogus", "hi").await.unwrap_err();
        assert!(matches!(err, ReplyqError::Send { .. }));
        assert!(err.to_string().contains("21211"), "got: {err}");
    }

    #[tokio::test]
    async fn dry_run_returns_synthetic_id() {
        let sender = DryRunSender;
        let id = sender.send("+1", "+2", "hello").await.unwrap();
        assert!(id.starts_with("dry-run-"));
        assert!(matches!(
            sender.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
