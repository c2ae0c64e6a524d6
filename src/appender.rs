//! The Slack appender: turns log events into webhook posts without blocking
//! the logging caller.
//!
//! Lifecycle is `new` → `activate` → `append`* → `close`. Events appended
//! before activation or after close are dropped with a diagnostic.

use crate::config::AppenderConfig;
use crate::core::{Layout, LogEvent};
use crate::error::{AppenderError, Result};
use crate::formatting::NotificationBuilder;
use crate::notification::manager::{DispatchTracker, Dispatcher, ErrorHandler, LoggingErrorHandler};
use crate::notification::slack::{SendOutcome, SlackClient, WebhookTransport};
use crate::utils::env;
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::{debug, error, info, warn};

struct ActiveState {
    builder: NotificationBuilder,
    dispatcher: Dispatcher,
    transport: Arc<dyn WebhookTransport>,
}

/// Posts log events to a Slack incoming webhook.
pub struct SlackAppender {
    config: AppenderConfig,
    layout: Option<Arc<dyn Layout>>,
    error_handler: Arc<dyn ErrorHandler>,
    transport: Option<Arc<dyn WebhookTransport>>,
    identity: Option<(String, String)>,
    state: Option<ActiveState>,
    closed: AtomicBool,
    drained: AtomicBool,
    runtime: Mutex<Option<Runtime>>,
}

impl SlackAppender {
    /// Creates an inactive appender. Call [`SlackAppender::activate`] before
    /// appending.
    pub fn new(config: AppenderConfig) -> Self {
        Self {
            config,
            layout: None,
            error_handler: Arc::new(LoggingErrorHandler),
            transport: None,
            identity: None,
            state: None,
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            runtime: Mutex::new(None),
        }
    }

    /// Renders message text through `layout`.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Receives failures of individual sends.
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Uses `transport` instead of a [`SlackClient`] built from the webhook URL.
    pub fn with_transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the process and machine names shown in attachments.
    pub fn with_identity(
        mut self,
        process_name: impl Into<String>,
        machine_name: impl Into<String>,
    ) -> Self {
        self.identity = Some((process_name.into(), machine_name.into()));
        self
    }

    pub fn config(&self) -> &AppenderConfig {
        &self.config
    }

    /// Resolves the webhook URL and starts accepting events.
    ///
    /// Sends run on the current tokio runtime when called inside one;
    /// otherwise the appender starts and owns a small multi-thread runtime.
    pub fn activate(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Err(AppenderError::AlreadyActivated);
        }

        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                let webhook_url = env::expand(&self.config.webhook_url);
                if webhook_url.trim().is_empty() {
                    return Err(AppenderError::MissingWebhookUrl);
                }
                let timeout = self.config.request_timeout_ms.map(Duration::from_millis);
                Arc::new(SlackClient::new(&webhook_url, timeout)?) as Arc<dyn WebhookTransport>
            }
        };

        if let Some(proxy) = &self.config.proxy {
            warn!(proxy = %proxy, "A proxy is configured but is not applied to the webhook transport");
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(num_cpus::get().clamp(1, 4))
                    .thread_name("slack-appender")
                    .enable_all()
                    .build()?;
                let handle = runtime.handle().clone();
                *self.lock_runtime() = Some(runtime);
                handle
            }
        };

        let builder = match &self.identity {
            Some((process, machine)) => {
                NotificationBuilder::with_identity(&self.config, process.clone(), machine.clone())
            }
            None => NotificationBuilder::new(&self.config),
        };
        let builder = match &self.layout {
            Some(layout) => builder.with_layout(Arc::clone(layout)),
            None => builder,
        };

        let dispatcher = Dispatcher::new(handle, DispatchTracker::new())
            .with_error_handler(Arc::clone(&self.error_handler));

        self.state = Some(ActiveState {
            builder,
            dispatcher,
            transport,
        });
        info!(
            attachments = self.config.add_attachment,
            owns_runtime = self.lock_runtime().is_some(),
            "Slack appender activated"
        );
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some() && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends that have been submitted but have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.dispatcher.tracker().in_flight())
    }

    /// Builds a notification for `event` and sends it in the background.
    ///
    /// Returns as soon as the send is registered; never fails.
    pub fn append(&self, event: &LogEvent) {
        if self.is_closed() {
            error!(logger = %event.logger_name, "Slack appender is closed, dropping event");
            return;
        }
        let Some(state) = &self.state else {
            error!(logger = %event.logger_name, "Slack appender was not activated, dropping event");
            return;
        };

        // Tracked from here, so a failure while building still settles the count.
        let guard = state.dispatcher.tracker().track();
        // A close that raced the check above drains only what it can see.
        if self.is_closed() {
            drop(guard);
            error!(logger = %event.logger_name, "Slack appender is closed, dropping event");
            return;
        }
        let payload = state.builder.build(event);
        let transport = Arc::clone(&state.transport);

        state.dispatcher.submit_tracked(guard, async move {
            match transport.post(&payload).await {
                SendOutcome::Delivered(_) => Ok(()),
                SendOutcome::Failed => Err(anyhow!("webhook delivery failed")),
            }
        });
    }

    /// Stops accepting events and blocks until every pending send settled.
    ///
    /// On a current-thread runtime that also runs the sends this cannot
    /// block; it still stops accepting events, and a following
    /// [`SlackAppender::close_async`] performs the drain.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.drained.load(Ordering::SeqCst) {
            return;
        }

        if let Some(state) = &self.state {
            debug!("Waiting for all sends to complete");
            let owns_runtime = self.lock_runtime().is_some();
            match Handle::try_current().map(|h| h.runtime_flavor()) {
                Err(_) => state.dispatcher.drain(),
                Ok(RuntimeFlavor::CurrentThread) if !owns_runtime => {
                    error!("Cannot block for pending sends on a current-thread runtime, use close_async");
                    return;
                }
                Ok(RuntimeFlavor::CurrentThread) => state.dispatcher.drain(),
                Ok(_) => tokio::task::block_in_place(|| state.dispatcher.drain()),
            }
            debug!("All sends completed");
        }

        self.drained.store(true, Ordering::SeqCst);
        self.shutdown_runtime();
        debug!("Slack appender closed");
    }

    /// Async variant of [`SlackAppender::close`]. Also completes a blocking
    /// close that could not wait.
    pub async fn close_async(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.drained.load(Ordering::SeqCst) {
            return;
        }

        if let Some(state) = &self.state {
            debug!("Waiting for all sends to complete");
            state.dispatcher.drain_async().await;
            debug!("All sends completed");
        }

        self.drained.store(true, Ordering::SeqCst);
        self.shutdown_runtime();
        debug!("Slack appender closed");
    }

    fn shutdown_runtime(&self) {
        if let Some(runtime) = self.lock_runtime().take() {
            runtime.shutdown_background();
        }
    }

    fn lock_runtime(&self) -> std::sync::MutexGuard<'_, Option<Runtime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SlackAppender {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async contexts.
        self.shutdown_runtime();
    }
}
