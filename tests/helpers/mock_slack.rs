//! Mock webhook transports and error handlers for appender tests.
#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::StatusCode;
use slack_appender::notification::{ErrorHandler, SendOutcome, WebhookTransport};
use slack_appender::Payload;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every payload it is asked to post. Messages whose text contains
/// `fail_marker` are reported as failed instead.
#[derive(Clone, Debug, Default)]
pub struct MockSlackClient {
    pub sent: Arc<Mutex<Vec<Payload>>>,
    pub fail_marker: Option<String>,
    pub delay: Option<Duration>,
}

impl MockSlackClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent_texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.text.clone())
            .collect();
        texts.sort();
        texts
    }
}

#[async_trait]
impl WebhookTransport for MockSlackClient {
    async fn post(&self, payload: &Payload) -> SendOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(marker) = &self.fail_marker {
            if payload.text.contains(marker.as_str()) {
                return SendOutcome::Failed;
            }
        }
        self.sent.lock().unwrap().push(payload.clone());
        SendOutcome::Delivered(StatusCode::OK)
    }
}

/// Collects every failure reported by the dispatcher.
#[derive(Debug, Default)]
pub struct RecordingErrorHandler {
    pub errors: Mutex<Vec<String>>,
}

impl RecordingErrorHandler {
    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn error(&self, message: &str, error: &anyhow::Error) {
        self.errors
            .lock()
            .unwrap()
            .push(format!("{}: {}", message, error));
    }
}
