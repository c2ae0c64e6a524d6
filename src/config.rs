//! Configuration management for the Slack appender
//!
//! This module defines the `AppenderConfig` struct holding every setting the
//! appender consumes. It uses the `figment` crate to layer built-in defaults,
//! an optional `slack-appender.toml` file and `SLACK_APPENDER_` environment
//! variables.

use crate::error::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Settings for a single Slack appender.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppenderConfig {
    /// The incoming webhook URL. Environment placeholders are expanded once,
    /// at activation.
    pub webhook_url: String,
    /// Default bot username.
    pub username: Option<String>,
    /// Default channel override.
    pub channel: Option<String>,
    /// Default icon URL.
    pub icon_url: Option<String>,
    /// Default icon emoji.
    pub icon_emoji: Option<String>,
    /// Attach a styled attachment to every message.
    #[serde(default)]
    pub add_attachment: bool,
    /// Include the exception trace as attachment fields.
    #[serde(default)]
    pub add_exception_trace_field: bool,
    /// Append " - <logger>" to the username instead of adding a Logger field.
    #[serde(default)]
    pub username_append_logger_name: bool,
    /// Ask Slack to linkify channel and user names.
    #[serde(default)]
    pub link_names: bool,
    /// Per-level attachment colors.
    #[serde(default)]
    pub mappings: Vec<LevelColorMapping>,
    /// Outbound proxy address. Accepted but not applied to the transport.
    pub proxy: Option<String>,
    /// Optional request timeout; the HTTP client default applies when unset.
    pub request_timeout_ms: Option<u64>,
}

/// Maps a level name to an attachment color.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LevelColorMapping {
    /// Level name, matched case-insensitively.
    pub level: String,
    /// A named color (e.g. "Orange") or any raw color string (e.g. "#36a64f").
    pub back_color: String,
}

impl LevelColorMapping {
    pub fn new(level: impl Into<String>, back_color: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            back_color: back_color.into(),
        }
    }
}

impl AppenderConfig {
    /// Creates a config for the given webhook with everything else defaulted.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            ..Self::default()
        }
    }

    /// Loads the configuration from defaults, an optional TOML file and the
    /// environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::figment(config_path).extract().map_err(Into::into)
    }

    /// Like [`AppenderConfig::load`], with an extra provider merged last.
    pub fn load_with<P: Provider>(config_path: Option<&Path>, overrides: P) -> Result<Self> {
        Self::figment(config_path)
            .merge(overrides)
            .extract()
            .map_err(Into::into)
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppenderConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        // e.g. SLACK_APPENDER_WEBHOOK_URL, SLACK_APPENDER_ADD_ATTACHMENT=true
        figment.merge(Env::prefixed("SLACK_APPENDER_"))
    }

    /// Builds the case-insensitive level to color lookup. Later mappings for
    /// the same level replace earlier ones.
    pub fn color_mappings(&self) -> HashMap<String, String> {
        self.mappings
            .iter()
            .map(|m| (m.level.to_lowercase(), m.back_color.clone()))
            .collect()
    }
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: None,
            channel: None,
            icon_url: None,
            icon_emoji: None,
            add_attachment: false,
            add_exception_trace_field: false,
            username_append_logger_name: false,
            link_names: false,
            mappings: Vec::new(),
            proxy: None,
            request_timeout_ms: None,
        }
    }
}
