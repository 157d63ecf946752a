//! Destinations for verbose progress messages.
//!
//! A sink is handed to [`crate::CsrBuilder`] explicitly; nothing is looked up
//! from thread-local or global state.

use tracing::info;

/// Receives human-readable progress messages while a matrix is built.
///
/// Closures taking `&str` implement the trait, so a callback can be passed
/// directly.
///
/// # Examples
/// ```
/// use std::sync::{Arc, Mutex};
/// use svmload_core::ProgressSink;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = {
///     let seen = Arc::clone(&seen);
///     move |message: &str| seen.lock().expect("lock").push(message.to_owned())
/// };
/// sink.progress("10 rows read into memory");
/// assert_eq!(seen.lock().expect("lock").len(), 1);
/// ```
pub trait ProgressSink: Send + Sync {
    /// Delivers one message.
    fn progress(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn progress(&self, message: &str) {
        self(message);
    }
}

/// Forwards progress messages to `tracing` at `INFO` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&self, message: &str) {
        info!(target: "svmload::progress", "{message}");
    }
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _message: &str) {}
}
