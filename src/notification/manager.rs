//! Fire-and-forget dispatch of webhook sends, with a drain for shutdown.
//!
//! Every send holds an [`InFlightGuard`] for its whole lifetime. The guard is
//! taken before the payload is built and released when the spawned task
//! settles, however it settles, so the in-flight count can never leak and
//! `drain` always terminates once callers stop submitting.

use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error};

/// Receives failures from sends that ran on the dispatcher.
pub trait ErrorHandler: Send + Sync {
    fn error(&self, message: &str, error: &anyhow::Error);
}

/// Reports failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn error(&self, message: &str, error: &anyhow::Error) {
        error!(error = %format!("{:#}", error), "{}", message);
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    count: Mutex<usize>,
    idle: Condvar,
    idle_notify: Notify,
}

/// Counts outstanding sends and lets shutdown wait for them.
///
/// The tracker is idle exactly when the count is zero. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct DispatchTracker {
    inner: Arc<TrackerInner>,
}

impl DispatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one in-flight send. The count drops again when the returned
    /// guard is dropped.
    pub fn track(&self) -> InFlightGuard {
        let mut count = self.lock();
        *count += 1;
        debug!(in_flight = *count, "Watched send count");
        metrics::gauge!("slack_appender_in_flight").set(*count as f64);
        InFlightGuard {
            tracker: self.clone(),
        }
    }

    /// The number of sends that have not settled yet.
    pub fn in_flight(&self) -> usize {
        *self.lock()
    }

    /// Blocks the calling thread until no sends are in flight.
    pub fn drain(&self) {
        let count = self.lock();
        let _count = self
            .inner
            .idle
            .wait_while(count, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`DispatchTracker::drain`], but gives up after `timeout`.
    /// Returns whether the tracker is idle.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        let count = self.lock();
        let (count, _) = self
            .inner
            .idle
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }

    /// Waits asynchronously until no sends are in flight.
    pub async fn drain_async(&self) {
        loop {
            // Register before checking so a release in between is not missed.
            let notified = self.inner.idle_notify.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        let mut count = self.lock();
        debug_assert!(*count > 0, "in-flight count underflow");
        *count = count.saturating_sub(1);
        debug!(in_flight = *count, "Watched send count");
        metrics::gauge!("slack_appender_in_flight").set(*count as f64);
        if *count == 0 {
            debug!("Watched send count is zero, signalling drain");
            self.inner.idle.notify_all();
            self.inner.idle_notify.notify_waiters();
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.inner
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// One registered in-flight send.
#[must_use = "dropping the guard immediately marks the send as settled"]
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: DispatchTracker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

/// Spawns tracked sends on a tokio runtime without waiting for them.
#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    tracker: DispatchTracker,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Dispatcher {
    /// Creates a dispatcher spawning onto `handle`, reporting failures through
    /// [`LoggingErrorHandler`].
    pub fn new(handle: Handle, tracker: DispatchTracker) -> Self {
        Self {
            handle,
            tracker,
            error_handler: Arc::new(LoggingErrorHandler),
        }
    }

    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn tracker(&self) -> &DispatchTracker {
        &self.tracker
    }

    /// Tracks and spawns `send`, returning immediately.
    pub fn submit<F>(&self, send: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let guard = self.tracker.track();
        self.submit_tracked(guard, send);
    }

    /// Spawns `send` under a guard the caller already holds.
    pub fn submit_tracked<F>(&self, guard: InFlightGuard, send: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let error_handler = Arc::clone(&self.error_handler);
        self.handle.spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(send).catch_unwind().await {
                Ok(Ok(())) => debug!("Watched send completed"),
                Ok(Err(e)) => error_handler.error("Error sending message to Slack", &e),
                Err(panic) => {
                    let e = anyhow!("send task panicked: {}", panic_message(panic.as_ref()));
                    error_handler.error("Error sending message to Slack", &e);
                }
            }
        });
    }

    /// Blocks until every submitted send has settled.
    pub fn drain(&self) {
        self.tracker.drain();
    }

    pub async fn drain_async(&self) {
        self.tracker.drain_async().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
