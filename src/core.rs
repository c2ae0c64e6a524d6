//! Core domain types for the appender
//!
//! This module defines the log event model the appender consumes, plus the
//! `Layout` contract used to render an event into the notification text.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;

/// A single log event as seen by the appender.
///
/// The appender only ever reads these; it does not care which logging
/// framework produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LogEvent {
    /// Level name as reported by the host framework (e.g. "WARN", "error").
    pub level: String,
    /// Name of the logger (or `tracing` target) that emitted the event.
    pub logger_name: String,
    /// The already-rendered message text.
    pub message: String,
    /// An exception attached to the event, if any.
    pub exception: Option<ExceptionInfo>,
}

impl LogEvent {
    pub fn new(
        level: impl Into<String>,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            logger_name: logger_name.into(),
            message: message.into(),
            exception: None,
        }
    }

    /// Attaches an exception to the event.
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }
}

/// Exception details carried by a log event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExceptionInfo {
    pub message: String,
    pub type_name: String,
    pub stack_trace: Option<String>,
}

impl ExceptionInfo {
    pub fn new(
        type_name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            type_name: type_name.into(),
            stack_trace,
        }
    }

    /// Captures an error value.
    ///
    /// The type name is the last path segment of `E`, and the trace is the
    /// rendered `source()` chain, one cause per line.
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let full_name = std::any::type_name::<E>();
        let type_name = short_type_name(full_name).to_string();

        let causes: Vec<String> = std::iter::successors(err.source(), |&cause| cause.source())
            .map(|cause| format!("Caused by: {}", cause))
            .collect();

        Self {
            message: err.to_string(),
            type_name,
            stack_trace: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }
}

/// Strips module paths (and generic arguments) from a type name.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Renders a log event into the notification's main text.
pub trait Layout: Send + Sync {
    fn format(&self, event: &LogEvent) -> String;
}

/// `LEVEL - message`, the classic simple layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleLayout;

impl Layout for SimpleLayout {
    fn format(&self, event: &LogEvent) -> String {
        format!("{} - {}", event.level.to_uppercase(), event.message)
    }
}
