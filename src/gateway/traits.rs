//! Gateway trait definition.
//!
//! A gateway is the transport a [`Connection`](crate::Connection) drives:
//! it connects, runs one command at a time, hands back output line by line
//! and moves files.

use std::path::Path;

use async_trait::async_trait;

use crate::command::ExitStatus;
use crate::error::GatewayError;

/// Transport capability consumed by a connection.
///
/// Implementations must be thread-safe (`Send + Sync`) so a connection can be
/// moved into a task. A gateway runs a single command stream at a time.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Open and authenticate a session.
    ///
    /// `username` of `None` selects the gateway's own default user.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Session established
    /// * `Ok(false)` - Credentials were rejected
    /// * `Err(e)` - Transport failure while connecting
    async fn connect(&mut self, username: Option<&str>) -> Result<bool, GatewayError>;

    /// Whether a live session is currently held.
    fn connected(&self) -> bool;

    /// Start `command` on the remote shell. Output is read with
    /// [`Gateway::next_line`].
    async fn run(&mut self, command: &str) -> Result<(), GatewayError>;

    /// Next line of output from the current command, or `None` once the
    /// stream is exhausted.
    async fn next_line(&mut self) -> Result<Option<String>, GatewayError>;

    /// Exit status of the most recent command.
    fn status(&self) -> ExitStatus;

    /// Download `remote` into the local file `local`.
    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), GatewayError>;

    /// Download `remote` and return its contents.
    async fn get_string(&mut self, remote: &str) -> Result<String, GatewayError>;

    /// Upload the local file `local` to `remote`.
    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), GatewayError>;

    /// Write `contents` to `remote`.
    async fn put_string(&mut self, remote: &str, contents: &str) -> Result<(), GatewayError>;
}
