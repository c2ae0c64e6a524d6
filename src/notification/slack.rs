//! A client for posting payloads to a Slack incoming webhook.

use crate::error::{AppenderError, Result};
use crate::payload::{self, Payload};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, error, instrument, Level};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What happened to a single send. Failures have already been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered(StatusCode),
    Failed,
}

/// A transport that can deliver a payload to a webhook.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Posts the payload. Never fails outward: problems are logged and
    /// reported as [`SendOutcome::Failed`].
    async fn post(&self, payload: &Payload) -> SendOutcome;
}

/// Builds the form body Slack expects: `payload=<percent-encoded JSON>`.
pub fn form_body(json: &str) -> String {
    format!("payload={}", urlencoding::encode(json))
}

/// A client for sending messages to a Slack webhook.
#[derive(Debug, Clone)]
pub struct SlackClient {
    webhook_url: Url,
    client: reqwest::Client,
}

impl SlackClient {
    /// Creates a new `SlackClient` for an already-expanded webhook URL.
    ///
    /// The underlying connection pool is shared by every send made through
    /// this client (and its clones).
    pub fn new(webhook_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let webhook_url = Url::parse(webhook_url).map_err(|e| AppenderError::InvalidWebhookUrl {
            url: webhook_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder =
            reqwest::Client::builder().min_tls_version(reqwest::tls::Version::TLS_1_2);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            webhook_url,
            client: builder.build()?,
        })
    }

    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    /// Sends the request, turning every failure into an error.
    async fn try_post(&self, payload: &Payload) -> anyhow::Result<StatusCode> {
        let json = payload.to_json()?;
        let body = form_body(&json);
        debug!(body = %body, "Posting payload to Slack");

        let response = self
            .client
            .post(self.webhook_url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if tracing::enabled!(Level::DEBUG) {
            let text = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %text, "Slack response");
        }

        if !status.is_success() {
            anyhow::bail!("Slack webhook returned status {}", status);
        }
        Ok(status)
    }
}

#[async_trait]
impl WebhookTransport for SlackClient {
    #[instrument(skip_all, fields(attachments = payload.attachments.len()))]
    async fn post(&self, payload: &Payload) -> SendOutcome {
        match self.try_post(payload).await {
            Ok(status) => {
                metrics::counter!("slack_appender_sent_total").increment(1);
                SendOutcome::Delivered(status)
            }
            Err(e) => {
                metrics::counter!("slack_appender_failed_total").increment(1);
                error!(error = %format!("{:#}", e), "Unable to send message to Slack");
                SendOutcome::Failed
            }
        }
    }
}

/// Encodes a payload to the exact form body [`SlackClient`] would post.
pub fn encode_form(payload: &Payload) -> Result<String> {
    let json = payload::encode(payload)?;
    Ok(form_body(&String::from_utf8_lossy(&json)))
}
