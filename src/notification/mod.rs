//! Delivery side of the appender.
//!
//! `slack` holds the webhook transport, `manager` the tracked fire-and-forget
//! dispatcher, and `layer` the bridge from `tracing` events into the appender.
pub mod layer;
pub mod manager;
pub mod slack;

pub use layer::SlackLayer;
pub use manager::{DispatchTracker, Dispatcher, ErrorHandler, InFlightGuard, LoggingErrorHandler};
pub use slack::{SendOutcome, SlackClient, WebhookTransport};
