/// Slack appender - log events as Slack webhook notifications
///
/// This library turns log events into styled Slack messages and posts them
/// in the background, with a drain that lets shutdown wait for every pending
/// send.
pub mod notification;

pub mod appender;
pub mod cli;
pub mod colors;
pub mod config;
pub mod core;
pub mod error;
pub mod formatting;
pub mod payload;
pub mod utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use appender::SlackAppender;
pub use config::{AppenderConfig, LevelColorMapping};
pub use error::AppenderError;
pub use formatting::NotificationBuilder;
pub use notification::SlackLayer;
pub use payload::{Attachment, Field, Payload};
