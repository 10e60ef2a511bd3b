//! Default gateway backed by a russh client session.
//!
//! ## Session Lifecycle
//!
//! 1. **Address Parsing**: `host:port`, `[v6]:port`, or a bare host / IPv6
//!    address with default port 22.
//! 2. **Connection**: TCP connect bounded by the connect timeout, then the
//!    [`AuthMaterial`] methods are tried in order.
//! 3. **Command Streaming**: each `run` opens a session channel and execs the
//!    command; `next_line` reads channel messages on demand, so at most one
//!    chunk of output is buffered ahead of the caller.
//! 4. **Transfers**: separate exec channels running `cat`, with file bodies
//!    carried over channel stdout (download) or stdin (upload).
//!
//! Sessions are never retried here. A dropped session shows up as
//! `connected() == false` and the owning connection decides what to do.

use std::net::Ipv6Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{Channel, ChannelMsg, client, keys};
use tracing::{debug, info, warn};

use crate::command::ExitStatus;
use crate::config::{GatewayConfig, resolve_username};
use crate::error::GatewayError;
use crate::filesystem::{Filesystem, LocalFilesystem};

use super::auth::AuthMaterial;
use super::lines::LineBuffer;
use super::traits::Gateway;

/// Default SSH port when the address carries none
pub(crate) const DEFAULT_SSH_PORT: u16 = 22;

/// Client handler for russh that accepts all host keys.
///
/// Equivalent to `StrictHostKeyChecking=no`; host key pinning belongs to
/// whoever resolves identities.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Build russh client configuration.
///
/// Sessions stay open while idle (no inactivity timeout) and are kept alive
/// with a 30 second keepalive, so a connection can sit between commands.
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// Accepts `host`, `host:port`, a bare IPv6 address (`fe80::1`) and the
/// bracketed forms `[::1]` and `[::1]:2222`. Brackets are stripped from the
/// returned host so it can be handed to the resolver as-is.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), String> {
    if address.parse::<Ipv6Addr>().is_ok() {
        return Ok((address.to_string(), DEFAULT_SSH_PORT));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("Unterminated '[' in address: {}", address))?;
        let port = match tail {
            "" => DEFAULT_SSH_PORT,
            _ => tail
                .strip_prefix(':')
                .ok_or_else(|| format!("Unexpected text after ']' in address: {}", address))?
                .parse::<u16>()
                .map_err(|e| format!("Invalid port number: {}", e))?,
        };
        return Ok((host.to_string(), port));
    }

    if let Some((host, port_str)) = address.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {}", e))?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), DEFAULT_SSH_PORT))
    }
}

/// Quote a remote path for a POSIX shell.
pub(crate) fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}

/// Gateway speaking SSH through russh.
pub struct SshGateway {
    host: String,
    port: u16,
    auth: AuthMaterial,
    config: GatewayConfig,
    local: LocalFilesystem,
    handle: Option<client::Handle<SshClientHandler>>,
    stream: Option<Channel<client::Msg>>,
    lines: LineBuffer,
    exit_status: Option<u32>,
}

impl SshGateway {
    /// Create a gateway bound to `address` (`host`, `host:port`, or an IPv6
    /// address, bare or bracketed).
    ///
    /// Nothing is dialled until [`Gateway::connect`] is called.
    pub fn new(
        address: &str,
        auth: AuthMaterial,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let (host, port) = parse_address(address)?;
        let local = LocalFilesystem::new(config.local_root.clone());
        Ok(Self {
            host,
            port,
            auth,
            config,
            local,
            handle: None,
            stream: None,
            lines: LineBuffer::new(),
            exit_status: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn session(&self) -> Result<&client::Handle<SshClientHandler>, GatewayError> {
        self.handle
            .as_ref()
            .ok_or_else(|| GatewayError::new("SSH session is not connected"))
    }

    /// Close the current command channel and release any trailing fragment.
    async fn end_stream(&mut self) {
        if let Some(channel) = self.stream.take() {
            let _ = channel.close().await;
        }
        self.lines.finish();
    }
}

#[async_trait]
impl Gateway for SshGateway {
    async fn connect(&mut self, username: Option<&str>) -> Result<bool, GatewayError> {
        if self.connected() {
            return Ok(true);
        }

        let username = resolve_username(username);
        let timeout = self.config.connect_timeout;
        debug!(
            "Opening SSH session to {}@{}:{} (timeout {:?})",
            username, self.host, self.port, timeout
        );

        let config = build_client_config(self.config.compress);
        let connect_future =
            client::connect(config, (self.host.as_str(), self.port), SshClientHandler);

        let mut handle = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| format!("Connection timed out after {:?}", timeout))?
            .map_err(|e| format!("Failed to connect: {}", e))?;

        if !self.auth.authenticate(&mut handle, &username).await? {
            warn!(
                "All authentication methods rejected for {}@{}",
                username, self.host
            );
            return Ok(false);
        }

        info!(
            "SSH session established to {}@{}:{}",
            username, self.host, self.port
        );
        self.handle = Some(handle);
        Ok(true)
    }

    fn connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    async fn run(&mut self, command: &str) -> Result<(), GatewayError> {
        self.end_stream().await;
        self.lines.clear();
        self.exit_status = None;

        debug!("Executing on {}: {}", self.host, command);
        let channel = open_exec(self.session()?, command).await?;
        self.stream = Some(channel);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, GatewayError> {
        loop {
            if let Some(line) = self.lines.pop() {
                return Ok(Some(line));
            }

            let Some(channel) = self.stream.as_mut() else {
                return Ok(None);
            };

            let timeout = self.config.command_timeout;
            let msg = tokio::time::timeout(timeout, channel.wait()).await;

            match msg {
                Err(_) => {
                    warn!(
                        "No output from {} for {:?}, closing command channel",
                        self.host, timeout
                    );
                    self.end_stream().await;
                }
                Ok(Some(ChannelMsg::Data { data })) => self.lines.push(&data),
                // ext == 1 is stderr in SSH protocol
                Ok(Some(ChannelMsg::ExtendedData { data, ext: 1 })) => self.lines.push(&data),
                Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    self.exit_status = Some(exit_status);
                }
                Ok(Some(ChannelMsg::Eof)) => {
                    // Keep reading until the exit status arrives
                    if self.exit_status.is_some() {
                        self.end_stream().await;
                    }
                }
                Ok(Some(ChannelMsg::Close)) | Ok(None) => self.end_stream().await,
                Ok(Some(_)) => {}
            }
        }
    }

    fn status(&self) -> ExitStatus {
        match self.exit_status {
            Some(code) => ExitStatus::Code(code as i32),
            None => ExitStatus::Boolean(false),
        }
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), GatewayError> {
        let contents = download(self.session()?, remote, self.config.command_timeout).await?;
        self.local
            .write_bytes(local, &contents)
            .await
            .map_err(|e| GatewayError::new(format!("Failed to write {:?}: {}", local, e)))
    }

    async fn get_string(&mut self, remote: &str) -> Result<String, GatewayError> {
        let contents = download(self.session()?, remote, self.config.command_timeout).await?;
        String::from_utf8(contents)
            .map_err(|e| GatewayError::new(format!("{} is not valid UTF-8: {}", remote, e)))
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), GatewayError> {
        let contents = self
            .local
            .read_bytes(local)
            .await
            .map_err(|e| GatewayError::new(format!("Failed to read {:?}: {}", local, e)))?;
        upload(self.session()?, remote, &contents, self.config.command_timeout).await
    }

    async fn put_string(&mut self, remote: &str, contents: &str) -> Result<(), GatewayError> {
        upload(
            self.session()?,
            remote,
            contents.as_bytes(),
            self.config.command_timeout,
        )
        .await
    }
}

async fn open_exec(
    handle: &client::Handle<SshClientHandler>,
    command: &str,
) -> Result<Channel<client::Msg>, GatewayError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| format!("Failed to open channel: {}", e))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| format!("Failed to execute command: {}", e))?;

    Ok(channel)
}

/// Everything a finished transfer channel produced.
struct ChannelOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
}

impl ChannelOutput {
    fn check(self, remote: &str) -> Result<Vec<u8>, GatewayError> {
        match self.exit_code {
            Some(0) => Ok(self.stdout),
            Some(code) => Err(GatewayError::new(format!(
                "{}: remote exit code {}: {}",
                remote,
                code,
                String::from_utf8_lossy(&self.stderr).trim()
            ))),
            None => Err(GatewayError::new(format!(
                "{}: channel closed without exit status",
                remote
            ))),
        }
    }
}

/// Read a channel to completion, bounded by `timeout`.
async fn collect(
    channel: &mut Channel<client::Msg>,
    timeout: Duration,
) -> Result<ChannelOutput, GatewayError> {
    let mut stdout = Vec::with_capacity(4096);
    let mut stderr = Vec::new();
    let mut exit_code = None;

    let result = tokio::time::timeout(timeout, async {
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    stderr.extend_from_slice(&data)
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(ChannelMsg::Eof) => {
                    if exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }
    })
    .await;

    let _ = channel.close().await;

    if result.is_err() {
        return Err(GatewayError::new(format!(
            "Transfer timed out after {:?}",
            timeout
        )));
    }

    Ok(ChannelOutput {
        stdout,
        stderr,
        exit_code,
    })
}

async fn download(
    handle: &client::Handle<SshClientHandler>,
    remote: &str,
    timeout: Duration,
) -> Result<Vec<u8>, GatewayError> {
    debug!("Downloading {}", remote);
    let command = format!("cat -- {}", shell_quote(remote));
    let mut channel = open_exec(handle, &command).await?;
    collect(&mut channel, timeout).await?.check(remote)
}

async fn upload(
    handle: &client::Handle<SshClientHandler>,
    remote: &str,
    contents: &[u8],
    timeout: Duration,
) -> Result<(), GatewayError> {
    debug!("Uploading {} bytes to {}", contents.len(), remote);
    let command = format!("cat > {}", shell_quote(remote));
    let mut channel = open_exec(handle, &command).await?;

    channel
        .data(contents)
        .await
        .map_err(|e| format!("Failed to send data: {}", e))?;
    channel
        .eof()
        .await
        .map_err(|e| format!("Failed to send EOF: {}", e))?;

    collect(&mut channel, timeout).await?.check(remote)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod address_parsing {
        use super::*;

        #[test]
        fn test_host_with_port() {
            let (host, port) = parse_address("example.com:2222").unwrap();
            assert_eq!(host, "example.com");
            assert_eq!(port, 2222);
        }

        #[test]
        fn test_host_without_port_defaults_to_22() {
            let (host, port) = parse_address("10.0.0.5").unwrap();
            assert_eq!(host, "10.0.0.5");
            assert_eq!(port, DEFAULT_SSH_PORT);
        }

        #[test]
        fn test_invalid_port_returns_error() {
            let err = parse_address("example.com:ssh").unwrap_err();
            assert!(err.contains("Invalid port number"));
        }

        #[test]
        fn test_port_out_of_range() {
            assert!(parse_address("example.com:99999").is_err());
        }

        #[test]
        fn test_bare_ipv6_uses_default_port() {
            assert_eq!(
                parse_address("::1").unwrap(),
                ("::1".to_string(), DEFAULT_SSH_PORT)
            );
            assert_eq!(
                parse_address("fe80::1").unwrap(),
                ("fe80::1".to_string(), DEFAULT_SSH_PORT)
            );
            assert_eq!(
                parse_address("2001:db8::beef").unwrap(),
                ("2001:db8::beef".to_string(), DEFAULT_SSH_PORT)
            );
        }

        #[test]
        fn test_bracketed_ipv6_without_port() {
            let (host, port) = parse_address("[::1]").unwrap();
            assert_eq!(host, "::1");
            assert_eq!(port, DEFAULT_SSH_PORT);
        }

        #[test]
        fn test_bracketed_ipv6_with_port() {
            let (host, port) = parse_address("[2001:db8::beef]:2222").unwrap();
            assert_eq!(host, "2001:db8::beef");
            assert_eq!(port, 2222);
        }

        #[test]
        fn test_malformed_bracketed_address() {
            assert!(parse_address("[::1").is_err());
            assert!(parse_address("[::1]22").is_err());
            assert!(parse_address("[::1]:ssh").is_err());
        }
    }

    mod client_config {
        use super::*;

        #[test]
        fn test_sessions_survive_idle_periods() {
            let config = build_client_config(true);
            assert_eq!(config.inactivity_timeout, None);
            assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
            assert_eq!(config.keepalive_max, 3);
        }

        #[test]
        fn test_compression_preference_present() {
            let enabled = build_client_config(true);
            let disabled = build_client_config(false);
            assert!(!enabled.preferred.compression.is_empty());
            assert!(!disabled.preferred.compression.is_empty());
        }
    }

    mod quoting {
        use super::*;

        #[test]
        fn test_plain_path() {
            assert_eq!(shell_quote("/etc/hostname"), "'/etc/hostname'");
        }

        #[test]
        fn test_path_with_spaces_and_quotes() {
            assert_eq!(shell_quote("/tmp/it's here"), r"'/tmp/it'\''s here'");
        }
    }

    mod gateway_state {
        use super::*;

        fn gateway() -> SshGateway {
            SshGateway::new(
                "10.0.0.5:2200",
                AuthMaterial::new().with_password("secret"),
                GatewayConfig::default(),
            )
            .unwrap()
        }

        #[test]
        fn test_new_does_not_connect() {
            let gateway = gateway();
            assert!(!gateway.connected());
            assert_eq!(gateway.host(), "10.0.0.5");
            assert_eq!(gateway.port(), 2200);
        }

        #[test]
        fn test_ipv6_identity_host_is_dialable() {
            let gateway = SshGateway::new(
                "2001:db8::beef",
                AuthMaterial::new(),
                GatewayConfig::default(),
            )
            .unwrap();
            assert_eq!(gateway.host(), "2001:db8::beef");
            assert_eq!(gateway.port(), DEFAULT_SSH_PORT);
        }

        #[test]
        fn test_bad_address_rejected() {
            let result = SshGateway::new("host:notaport", AuthMaterial::new(), GatewayConfig::default());
            assert!(result.is_err());
        }

        #[test]
        fn test_status_before_any_command() {
            assert_eq!(gateway().status(), ExitStatus::Boolean(false));
        }

        #[tokio::test]
        async fn test_next_line_without_command_ends_immediately() {
            let mut gateway = gateway();
            assert_eq!(gateway.next_line().await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_run_requires_session() {
            let mut gateway = gateway();
            let err = gateway.run("uptime").await.unwrap_err();
            assert!(err.message().contains("not connected"));
        }

        #[tokio::test]
        async fn test_transfer_requires_session() {
            let mut gateway = gateway();
            assert!(gateway.get_string("/etc/hostname").await.is_err());
            assert!(gateway.put_string("/tmp/x", "data").await.is_err());
        }
    }
}
