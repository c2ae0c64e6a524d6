//! A `tracing_subscriber` layer that forwards events to a [`SlackAppender`].
//!
//! The event's `message` field becomes the message, its target becomes the
//! logger name, and an `error` (or `exception`) field becomes the exception.
//! `exception.type` and `exception.stacktrace` refine it when present.
//! Without `exception.type` the type is read from the leading identifier of
//! the error's `Debug` output, falling back to `Error`.

use crate::appender::SlackAppender;
use crate::core::{ExceptionInfo, LogEvent};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets whose events are never forwarded: the appender's own diagnostics
/// and the HTTP stack it sends with.
const DEFAULT_IGNORED_TARGETS: &[&str] = &[
    "slack_appender",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "native_tls",
    "tokio",
    "mio",
    "want",
];

/// Forwards `tracing` events to a Slack appender.
pub struct SlackLayer {
    appender: Arc<SlackAppender>,
    ignored_targets: Vec<String>,
}

impl SlackLayer {
    pub fn new(appender: Arc<SlackAppender>) -> Self {
        Self {
            appender,
            ignored_targets: DEFAULT_IGNORED_TARGETS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Also ignores events whose target starts with `prefix`.
    pub fn ignore_target(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_targets.push(prefix.into());
        self
    }

    pub fn appender(&self) -> &Arc<SlackAppender> {
        &self.appender
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|prefix| {
            target == prefix
                || target
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }
}

impl<S: Subscriber> Layer<S> for SlackLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.appender.append(&visitor.into_log_event(
            metadata.level().as_str(),
            metadata.target(),
        ));
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    extra: Vec<String>,
    error_message: Option<String>,
    error_type: Option<String>,
    stack_trace: Option<String>,
}

impl EventVisitor {
    fn into_log_event(self, level: &str, target: &str) -> LogEvent {
        let mut message = self.message.unwrap_or_default();
        if !self.extra.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&self.extra.join(" "));
        }

        let exception = self.error_message.map(|error_message| {
            ExceptionInfo::new(
                self.error_type.unwrap_or_else(|| "Error".to_string()),
                error_message,
                self.stack_trace,
            )
        });

        LogEvent {
            level: level.to_string(),
            logger_name: target.to_string(),
            message,
            exception,
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        match field.name() {
            "error" | "exception" => {
                let info = ExceptionInfo::from_error(value);
                self.error_message = Some(info.message);
                if self.error_type.is_none() {
                    self.error_type = debug_type_name(&format!("{:?}", value));
                }
                if self.stack_trace.is_none() {
                    self.stack_trace = info.stack_trace;
                }
            }
            _ => self.record_text(field, value.to_string()),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}

/// The leading type-like identifier of a `Debug` rendering, e.g.
/// `OrderRejected` for `OrderRejected { id: 7 }`.
fn debug_type_name(debug: &str) -> Option<String> {
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let name = name.rsplit("::").next().unwrap_or_default();
    name.starts_with(|c: char| c.is_ascii_uppercase())
        .then(|| name.to_string())
}

impl EventVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "error" | "exception" => self.error_message = Some(value),
            "exception.type" => self.error_type = Some(value),
            "exception.stacktrace" | "backtrace" => self.stack_trace = Some(value),
            name => self.extra.push(format!("{}={}", name, value)),
        }
    }
}
