use thiserror::Error;

/// Errors surfaced while configuring or activating the appender.
///
/// None of these ever reach the logging call path: `append` only reports
/// problems through diagnostics.
#[derive(Debug, Error)]
pub enum AppenderError {
    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("No webhook URL configured")]
    MissingWebhookUrl,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to start dispatch runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Appender is already activated")]
    AlreadyActivated,
}

impl From<figment::Error> for AppenderError {
    fn from(err: figment::Error) -> Self {
        AppenderError::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, AppenderError>;
