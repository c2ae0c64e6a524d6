//! slack-appender - post a log event to Slack
//!
//! Loads the appender configuration, appends one event built from the
//! command line and waits for the send to settle before exiting.

use anyhow::Result;
use clap::Parser;
use slack_appender::{cli::Cli, AppenderConfig, LogEvent, SlackAppender};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppenderConfig::load_with(cli.config.as_deref(), cli.clone())?;

    info!("-------------------- Configuration --------------------");
    info!("Webhook configured: {}", !config.webhook_url.is_empty());
    info!("Channel: {}", config.channel.as_deref().unwrap_or("(webhook default)"));
    info!("Username: {}", config.username.as_deref().unwrap_or("(webhook default)"));
    info!("Attachment: {}", config.add_attachment);
    info!("Level mappings: {}", config.mappings.len());
    info!("-------------------------------------------------------");

    let mut appender = SlackAppender::new(config);
    appender.activate()?;

    appender.append(&LogEvent::new(cli.level, cli.logger, cli.message));
    appender.close();

    info!("Done.");
    Ok(())
}
