//! A single logical handle to a remote host.
//!
//! A [`Connection`] owns exactly one [`Gateway`] and never dials eagerly:
//! every operation that needs the transport goes through
//! [`Connection::gateway`], which checks the session and connects at most
//! once per call. A session that dropped in between is re-established
//! transparently; a failed attempt surfaces as [`Error::Connection`] and is
//! not retried.
//!
//! # Streaming
//!
//! [`Connection::run_with`] submits the command and then pulls output from
//! the gateway one line at a time, handing each line to the callback before
//! asking for the next. The loop stops at the gateway's end-of-stream and
//! never polls again afterwards. A nonzero remote exit is not an error; read
//! [`Connection::status`] once `run` returns.
//!
//! Operations that use the gateway take `&mut self`, so two commands can
//! never be in flight on one connection at the same time.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{CommandSequence, ExitStatus};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::filesystem::Filesystem;
use crate::gateway::{AuthMaterial, Gateway, SshGateway};
use crate::identity::{ConnectionIdentity, Roles};
use crate::sink::{NullSink, OutputSink};

static NULL_SINK: NullSink = NullSink;

/// Owns one identity and one gateway, and runs commands on that host.
pub struct Connection {
    identity: ConnectionIdentity,
    roles: Roles,
    gateway: Box<dyn Gateway>,
    output_sink: Option<Box<dyn OutputSink>>,
    filesystem: Option<Box<dyn Filesystem>>,
}

impl Connection {
    /// Create a connection using the default SSH gateway.
    ///
    /// The gateway is bound to `identity.host()` and `auth`, with local-side
    /// paths rooted at `/`. Settings come from the environment
    /// (see [`GatewayConfig::from_env`]). Nothing is dialled yet.
    pub fn new(identity: ConnectionIdentity, auth: AuthMaterial) -> Result<Self> {
        let gateway = SshGateway::new(identity.host(), auth, GatewayConfig::from_env())
            .map_err(|e| Error::InvalidIdentity(format!("{}: {}", identity.name(), e)))?;
        Ok(Self::with_gateway(identity, gateway))
    }

    /// Create a connection around a pre-built gateway.
    pub fn with_gateway(identity: ConnectionIdentity, gateway: impl Gateway + 'static) -> Self {
        let roles = identity.roles().clone();
        Self {
            identity,
            roles,
            gateway: Box::new(gateway),
            output_sink: None,
            filesystem: None,
        }
    }

    /// The owned gateway, connected.
    ///
    /// Connects first when the gateway reports no live session; when it is
    /// already connected, `connect` is not called.
    pub async fn gateway(&mut self) -> Result<&mut dyn Gateway> {
        if !self.gateway.connected() {
            self.establish().await?;
        }
        Ok(&mut *self.gateway)
    }

    async fn establish(&mut self) -> Result<()> {
        let host = self.identity.host();
        let username = self.identity.username();
        debug!(
            "Connecting '{}' to {} as {}",
            self.identity.name(),
            host,
            username.unwrap_or("<default user>")
        );
        self.output_sink()
            .write(&format!("[{}] connecting to {}", self.identity.name(), host));

        let source = match self.gateway.connect(username).await {
            Ok(true) => {
                info!("Connection '{}' established to {}", self.identity.name(), host);
                self.output_sink()
                    .write(&format!("[{}] connected", self.identity.name()));
                return Ok(());
            }
            Ok(false) => {
                warn!("Connection '{}' to {} was refused", self.identity.name(), host);
                None
            }
            Err(e) => {
                warn!(
                    "Connection '{}' to {} failed: {}",
                    self.identity.name(),
                    host,
                    e
                );
                Some(e)
            }
        };

        Err(Error::Connection {
            host: host.to_string(),
            source,
        })
    }

    /// Run `commands` and discard their output.
    ///
    /// Output is still drained line by line so the remote process never
    /// blocks on a full pipe.
    pub async fn run(&mut self, commands: impl Into<CommandSequence>) -> Result<()> {
        self.stream(commands.into(), |_, _| {}).await
    }

    /// Run `commands`, passing each output line and this connection to
    /// `on_line` as it arrives.
    ///
    /// A sequence is joined with `&&`, so the remote shell stops at the first
    /// failing step.
    pub async fn run_with<F>(
        &mut self,
        commands: impl Into<CommandSequence>,
        on_line: F,
    ) -> Result<()>
    where
        F: FnMut(&str, &Connection),
    {
        self.stream(commands.into(), on_line).await
    }

    async fn stream<F>(&mut self, commands: CommandSequence, mut on_line: F) -> Result<()>
    where
        F: FnMut(&str, &Connection),
    {
        if commands.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let script = commands.to_shell();
        self.gateway().await?.run(&script).await?;

        let mut lines = 0usize;
        while let Some(line) = self.gateway.next_line().await? {
            lines += 1;
            on_line(&line, self);
        }
        debug!(
            "'{}' finished `{}` after {} line(s)",
            self.identity.name(),
            script,
            lines
        );
        Ok(())
    }

    /// Exit status of the last command run on this connection.
    pub fn status(&self) -> ExitStatus {
        self.gateway.status()
    }

    /// Download `remote` to the local file `local`.
    pub async fn get(&mut self, remote: &str, local: impl AsRef<Path>) -> Result<()> {
        let gateway = self.gateway().await?;
        gateway
            .get(remote, local.as_ref())
            .await
            .map_err(|source| transfer_error(remote, source))
    }

    /// Download `remote` and return its contents.
    pub async fn get_string(&mut self, remote: &str) -> Result<String> {
        let gateway = self.gateway().await?;
        gateway
            .get_string(remote)
            .await
            .map_err(|source| transfer_error(remote, source))
    }

    /// Upload the local file `local` to `remote`.
    pub async fn put(&mut self, local: impl AsRef<Path>, remote: &str) -> Result<()> {
        let gateway = self.gateway().await?;
        gateway
            .put(local.as_ref(), remote)
            .await
            .map_err(|source| transfer_error(remote, source))
    }

    /// Write `contents` to `remote`.
    pub async fn put_string(&mut self, remote: &str, contents: &str) -> Result<()> {
        let gateway = self.gateway().await?;
        gateway
            .put_string(remote, contents)
            .await
            .map_err(|source| transfer_error(remote, source))
    }

    /// Attach the collaborator that the filesystem methods below forward to.
    ///
    /// Replaces any filesystem set earlier.
    pub fn set_filesystem(&mut self, filesystem: impl Filesystem + 'static) {
        self.filesystem = Some(Box::new(filesystem));
    }

    fn filesystem(&self) -> Result<&dyn Filesystem> {
        self.filesystem.as_deref().ok_or(Error::NoFilesystem)
    }

    /// Whether `path` exists on the attached filesystem.
    ///
    /// # Returns
    ///
    /// - `Err(Error::NoFilesystem)` when no filesystem was set
    /// - `Err(Error::Filesystem)` when the collaborator fails
    pub async fn exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.filesystem()?.exists(path.as_ref()).await?)
    }

    /// Whether `path` is a directory on the attached filesystem.
    pub async fn is_dir(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.filesystem()?.is_dir(path.as_ref()).await?)
    }

    /// Entries of the directory at `path`, sorted.
    pub async fn list_contents(&self, path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        Ok(self.filesystem()?.list_contents(path.as_ref()).await?)
    }

    /// Read `path` as UTF-8 text.
    pub async fn read_contents(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(self.filesystem()?.read_contents(path.as_ref()).await?)
    }

    /// Write `contents` to `path`, replacing any existing file.
    pub async fn write_contents(&self, path: impl AsRef<Path>, contents: &str) -> Result<()> {
        Ok(self
            .filesystem()?
            .write_bytes(path.as_ref(), contents.as_bytes())
            .await?)
    }

    /// Remove the file or empty directory at `path`.
    pub async fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.filesystem()?.remove(path.as_ref()).await?)
    }

    /// Progress sink; a [`NullSink`] unless one was set.
    pub fn output_sink(&self) -> &dyn OutputSink {
        self.output_sink.as_deref().unwrap_or(&NULL_SINK)
    }

    /// Route progress messages to `sink` instead of discarding them.
    pub fn set_output_sink(&mut self, sink: impl OutputSink + 'static) {
        self.output_sink = Some(Box::new(sink));
    }

    /// Whether this connection carries the role tag `role`.
    ///
    /// Answers from the snapshot taken at construction.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Role tags copied from the identity when the connection was built.
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// Display name of the target, used to prefix progress output.
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn host(&self) -> &str {
        self.identity.host()
    }

    /// Login user, or `None` to let the gateway pick its default.
    pub fn username(&self) -> Option<&str> {
        self.identity.username()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("roles", &self.roles)
            .field("connected", &self.gateway.connected())
            .finish_non_exhaustive()
    }
}

fn transfer_error(remote: &str, source: crate::error::GatewayError) -> Error {
    Error::Transfer {
        path: remote.to_string(),
        source,
    }
}
