//! Connection-wide destinations for progress messages.
//!
//! A sink is separate from the per-line callback given to
//! [`Connection::run_with`](crate::Connection::run_with): it receives status
//! text about the connection itself, never command stdout.

use tracing::info;

pub trait OutputSink: Send + Sync {
    fn write(&self, message: &str);
}

/// Discards everything. Used when no sink was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&self, _message: &str) {}
}

/// Forwards messages to the `tracing` subscriber at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write(&self, message: &str) {
        info!(target: "remote_conn::progress", "{}", message);
    }
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, message: &str) {
        self(message)
    }
}
