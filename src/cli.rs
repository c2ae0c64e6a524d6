//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the `slack-appender`
//! binary using the `clap` crate. Connection settings given here are merged
//! over the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Send a single log event to Slack through the appender.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Webhook URL, overriding the configuration.
    #[arg(long, value_name = "URL")]
    pub webhook_url: Option<String>,

    /// Channel to post to, overriding the configuration.
    #[arg(long)]
    pub channel: Option<String>,

    /// Bot username, overriding the configuration.
    #[arg(long)]
    pub username: Option<String>,

    /// Level of the event (e.g. INFO, WARN, ERROR).
    #[arg(short, long, default_value = "INFO")]
    pub level: String,

    /// Logger name reported with the event.
    #[arg(long, default_value = "slack-appender")]
    pub logger: String,

    /// The message text.
    #[arg(short, long)]
    pub message: String,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(url) = &self.webhook_url {
            dict.insert("webhook_url".into(), Value::from(url.clone()));
        }
        if let Some(channel) = &self.channel {
            dict.insert("channel".into(), Value::from(channel.clone()));
        }
        if let Some(username) = &self.username {
            dict.insert("username".into(), Value::from(username.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
