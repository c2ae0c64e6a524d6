//! Turns log events into Slack payloads.
//!
//! The builder owns everything it needs from configuration, so building a
//! payload never fails: unknown levels simply get the default color.

use crate::colors;
use crate::config::AppenderConfig;
use crate::core::{ExceptionInfo, Layout, LogEvent};
use crate::payload::{Attachment, Field, Payload};
use crate::utils::env;
use std::collections::HashMap;
use std::sync::Arc;

/// Slack truncates field values a little above this, so traces are split.
pub const TRACE_CHUNK_CHARS: usize = 1990;

const CODE_FENCE: &str = "```";
const FENCE_SUBSTITUTE: &str = "'''";

/// Builds a `Payload` for each log event.
pub struct NotificationBuilder {
    username: Option<String>,
    channel: Option<String>,
    icon_url: Option<String>,
    icon_emoji: Option<String>,
    add_attachment: bool,
    add_exception_trace_field: bool,
    username_append_logger_name: bool,
    link_names: bool,
    mappings: HashMap<String, String>,
    layout: Option<Arc<dyn Layout>>,
    process_name: String,
    machine_name: String,
}

impl NotificationBuilder {
    /// Creates a builder for the given configuration, naming the current
    /// process and host in every attachment.
    pub fn new(config: &AppenderConfig) -> Self {
        Self::with_identity(config, current_process_name(), current_machine_name())
    }

    /// Creates a builder with an explicit process and machine name.
    pub fn with_identity(
        config: &AppenderConfig,
        process_name: impl Into<String>,
        machine_name: impl Into<String>,
    ) -> Self {
        Self {
            username: config.username.clone(),
            channel: config.channel.clone(),
            icon_url: config.icon_url.clone(),
            icon_emoji: config.icon_emoji.clone(),
            add_attachment: config.add_attachment,
            add_exception_trace_field: config.add_exception_trace_field,
            username_append_logger_name: config.username_append_logger_name,
            link_names: config.link_names,
            mappings: config.color_mappings(),
            layout: None,
            process_name: process_name.into(),
            machine_name: machine_name.into(),
        }
    }

    /// Renders the message text through `layout` instead of using the raw
    /// event message.
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Builds the full payload for an event.
    ///
    /// Username, channel and icons are re-expanded from the environment on
    /// every call; empty results fall back to the raw configured defaults.
    pub fn build(&self, event: &LogEvent) -> Payload {
        let attachments = if self.add_attachment {
            vec![self.build_attachment(event)]
        } else {
            Vec::new()
        };

        let text = match &self.layout {
            Some(layout) => layout.format(event),
            None => event.message.clone(),
        };

        let mut username = env::expand(self.username.as_deref().unwrap_or_default());
        if self.username_append_logger_name {
            username.push_str(" - ");
            username.push_str(&event.logger_name);
        }

        Payload {
            channel: or_default(env::expand_opt(self.channel.as_deref()), &self.channel),
            username: or_default(Some(username), &self.username),
            icon_url: or_default(env::expand_opt(self.icon_url.as_deref()), &self.icon_url),
            icon_emoji: or_default(env::expand_opt(self.icon_emoji.as_deref()), &self.icon_emoji),
            text,
            attachments,
            link_names: self.link_names,
        }
    }

    /// Builds the styled attachment for an event.
    pub fn build_attachment(&self, event: &LogEvent) -> Attachment {
        let mut attachment = Attachment::new(format!(
            "[{}] {} in {} on {}",
            event.level, event.logger_name, self.process_name, self.machine_name
        ));
        attachment.color = self.resolve_color(&event.level);
        attachment.fields = vec![
            Field::short("Process", self.process_name.clone()),
            Field::short("Machine", self.machine_name.clone()),
        ];

        if !self.username_append_logger_name {
            attachment
                .fields
                .insert(0, Field::short("Logger", event.logger_name.clone()));
        }

        if let Some(exception) = &event.exception {
            self.prepend_exception(&mut attachment.fields, exception);
        }

        attachment
    }

    /// Picks the attachment color for a level name.
    pub fn resolve_color(&self, level: &str) -> String {
        let level = level.to_lowercase();
        if let Some(color) = self.mappings.get(&level) {
            return colors::resolve(color);
        }

        match level.as_str() {
            "warn" => "warning".to_string(),
            "error" | "fatal" => "danger".to_string(),
            _ => String::new(),
        }
    }

    fn prepend_exception(&self, fields: &mut Vec<Field>, exception: &ExceptionInfo) {
        fields.insert(0, Field::short("Exception Type", exception.type_name.clone()));

        if self.add_exception_trace_field {
            if let Some(trace) = exception
                .stack_trace
                .as_deref()
                .filter(|t| !t.trim().is_empty())
            {
                let sanitized = trace.replace(CODE_FENCE, FENCE_SUBSTITUTE);
                let chunks = split_trace(&sanitized, TRACE_CHUNK_CHARS);
                for (idx, chunk) in chunks.iter().enumerate().rev() {
                    let title = if idx == 0 {
                        "Exception Trace".to_string()
                    } else {
                        format!("Exception Trace {}", idx + 1)
                    };
                    fields.insert(0, Field::new(title, format!("{CODE_FENCE}{chunk}{CODE_FENCE}")));
                }
            }
        }

        fields.insert(0, Field::new("Exception Message", exception.message.clone()));
    }
}

fn or_default(value: Option<String>, default: &Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).or_else(|| default.clone())
}

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// When a chunk would be cut, it ends right after the last line break inside
/// the window if there is one. Line breaks stay in their chunk, so the chunks
/// concatenate back to `text`.
pub fn split_trace(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(byte_idx, _)| byte_idx);

        let cut = match window_end {
            None => rest.len(),
            Some(end) => match rest[..end].rfind(|c: char| c == '\n' || c == '\r') {
                Some(pos) => line_break_end(rest, pos, end),
                None => end,
            },
        };

        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

/// Byte offset just past the line break at `pos`, keeping `\r\n` together
/// when both fit before `limit`.
fn line_break_end(text: &str, pos: usize, limit: usize) -> usize {
    let bytes = text.as_bytes();
    if bytes[pos] == b'\r' && pos + 2 <= limit && bytes.get(pos + 1) == Some(&b'\n') {
        pos + 2
    } else {
        pos + 1
    }
}

fn current_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn current_machine_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LevelColorMapping;
    use crate::core::SimpleLayout;

    fn builder(config: AppenderConfig) -> NotificationBuilder {
        NotificationBuilder::with_identity(&config, "billing-api", "host-1")
    }

    fn attachment_config() -> AppenderConfig {
        AppenderConfig {
            add_attachment: true,
            add_exception_trace_field: true,
            ..AppenderConfig::new("https://hooks.example.com")
        }
    }

    fn titles(attachment: &Attachment) -> Vec<&str> {
        attachment.fields.iter().map(|f| f.title.as_str()).collect()
    }

    #[test]
    fn test_default_colors_by_level() {
        let b = builder(attachment_config());
        assert_eq!(b.resolve_color("WARN"), "warning");
        assert_eq!(b.resolve_color("warn"), "warning");
        assert_eq!(b.resolve_color("Error"), "danger");
        assert_eq!(b.resolve_color("FATAL"), "danger");
        assert_eq!(b.resolve_color("INFO"), "");
        assert_eq!(b.resolve_color("no-such-level"), "");
    }

    #[test]
    fn test_mapping_overrides_default_color() {
        let config = AppenderConfig {
            mappings: vec![
                LevelColorMapping::new("error", "Purple"),
                LevelColorMapping::new("INFO", "#36a64f"),
                LevelColorMapping::new("debug", "good"),
            ],
            ..attachment_config()
        };
        let b = builder(config);

        assert_eq!(b.resolve_color("ERROR"), "#800080");
        assert_eq!(b.resolve_color("info"), "#36a64f");
        assert_eq!(b.resolve_color("Debug"), "good");
        assert_eq!(b.resolve_color("warn"), "warning");
    }

    #[test]
    fn test_base_field_order_with_logger_field() {
        let b = builder(attachment_config());
        let attachment = b.build_attachment(&LogEvent::new("INFO", "orders", "hello"));

        assert_eq!(titles(&attachment), vec!["Logger", "Process", "Machine"]);
        assert!(attachment.fields.iter().all(|f| f.short_display));
        assert_eq!(attachment.fallback_text, "[INFO] orders in billing-api on host-1");
        assert_eq!(attachment.markdown_in, vec!["fields".to_string()]);
    }

    #[test]
    fn test_logger_field_omitted_when_appended_to_username() {
        let config = AppenderConfig {
            username_append_logger_name: true,
            username: Some("bot".to_string()),
            ..attachment_config()
        };
        let b = builder(config);
        let event = LogEvent::new("INFO", "orders", "hello");

        let payload = b.build(&event);
        assert_eq!(payload.username.as_deref(), Some("bot - orders"));
        assert_eq!(titles(&payload.attachments[0]), vec!["Process", "Machine"]);
    }

    #[test]
    fn test_exception_field_order() {
        let b = builder(attachment_config());
        let trace = "x".repeat(TRACE_CHUNK_CHARS * 2 + 10);
        let event = LogEvent::new("ERROR", "orders", "boom").with_exception(ExceptionInfo::new(
            "IoError",
            "disk full",
            Some(trace),
        ));

        let attachment = b.build_attachment(&event);
        assert_eq!(
            titles(&attachment),
            vec![
                "Exception Message",
                "Exception Trace",
                "Exception Trace 2",
                "Exception Trace 3",
                "Exception Type",
                "Logger",
                "Process",
                "Machine",
            ]
        );

        let message = &attachment.fields[0];
        assert_eq!(message.value, "disk full");
        assert!(!message.short_display);
        assert!(!attachment.fields[1].short_display);
        assert_eq!(attachment.fields[4].value, "IoError");
        assert!(attachment.fields[4].short_display);
    }

    #[test]
    fn test_trace_chunks_reassemble_to_sanitized_trace() {
        let b = builder(attachment_config());
        let mut trace = String::new();
        for i in 0..200 {
            trace.push_str(&format!("   at module::function_{i}() in src/lib.rs:line {i}\n"));
        }
        trace.push_str("```injected```");

        let event = LogEvent::new("ERROR", "orders", "boom")
            .with_exception(ExceptionInfo::new("E", "m", Some(trace.clone())));
        let attachment = b.build_attachment(&event);

        let rebuilt: String = attachment
            .fields
            .iter()
            .filter(|f| f.title.starts_with("Exception Trace"))
            .map(|f| {
                assert!(f.value.starts_with(CODE_FENCE) && f.value.ends_with(CODE_FENCE));
                let inner = &f.value[CODE_FENCE.len()..f.value.len() - CODE_FENCE.len()];
                assert!(!inner.contains(CODE_FENCE));
                assert!(inner.chars().count() <= TRACE_CHUNK_CHARS);
                inner.to_string()
            })
            .collect();

        assert_eq!(rebuilt, trace.replace(CODE_FENCE, FENCE_SUBSTITUTE));
        assert!(rebuilt.ends_with("'''injected'''"));
    }

    #[test]
    fn test_trace_field_skipped_when_disabled_or_blank() {
        let config = AppenderConfig {
            add_exception_trace_field: false,
            ..attachment_config()
        };
        let event = LogEvent::new("ERROR", "orders", "boom")
            .with_exception(ExceptionInfo::new("E", "m", Some("trace".to_string())));
        assert_eq!(
            titles(&builder(config).build_attachment(&event)),
            vec!["Exception Message", "Exception Type", "Logger", "Process", "Machine"]
        );

        let blank = LogEvent::new("ERROR", "orders", "boom")
            .with_exception(ExceptionInfo::new("E", "m", Some("  \n ".to_string())));
        assert_eq!(
            titles(&builder(attachment_config()).build_attachment(&blank)),
            vec!["Exception Message", "Exception Type", "Logger", "Process", "Machine"]
        );
    }

    #[test]
    fn test_split_trace_counts_without_line_breaks() {
        for len in [1, 1989, 1990, 1991, 3980, 5000] {
            let text = "a".repeat(len);
            let chunks = split_trace(&text, TRACE_CHUNK_CHARS);
            assert_eq!(chunks.len(), len.div_ceil(TRACE_CHUNK_CHARS), "len {len}");
            assert_eq!(chunks.concat(), text);
        }
        assert!(split_trace("", TRACE_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn test_split_trace_prefers_line_breaks() {
        let text = "aaaa\nbbbb\r\ncccc";
        assert_eq!(split_trace(text, 7), vec!["aaaa\n", "bbbb\r\n", "cccc"]);
    }

    #[test]
    fn test_split_trace_never_splits_code_points() {
        let text = "é".repeat(5);
        let chunks = split_trace(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_build_without_attachment_uses_layout_and_defaults() {
        let config = AppenderConfig {
            add_attachment: false,
            channel: Some("#alerts".to_string()),
            icon_emoji: Some(":fire:".to_string()),
            link_names: true,
            ..AppenderConfig::new("https://hooks.example.com")
        };
        let b = builder(config).with_layout(Arc::new(SimpleLayout));
        let payload = b.build(&LogEvent::new("warn", "orders", "slow"));

        assert!(payload.attachments.is_empty());
        assert_eq!(payload.text, "WARN - slow");
        assert_eq!(payload.channel.as_deref(), Some("#alerts"));
        assert_eq!(payload.icon_emoji.as_deref(), Some(":fire:"));
        assert_eq!(payload.icon_url, None);
        assert_eq!(payload.username, None);
        assert!(payload.link_names);
    }
}
