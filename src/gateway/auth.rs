//! Authentication material for SSH sessions.
//!
//! [`AuthMaterial`] is an ordered list of methods tried one after another
//! until the server accepts one:
//!
//! - [`AuthMethod::Password`]: username/password
//! - [`AuthMethod::KeyFile`]: passphrase-less private key on disk
//! - [`AuthMethod::Agent`]: every identity offered by `SSH_AUTH_SOCK`
//!
//! Material with no methods falls back to the agent.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::{client, keys};
use tracing::{debug, info};

use super::ssh::SshClientHandler;

/// One way of proving who we are to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    KeyFile(PathBuf),
    Agent,
}

impl AuthMethod {
    /// Short label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::KeyFile(_) => "key",
            AuthMethod::Agent => "agent",
        }
    }

    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        match self {
            AuthMethod::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map(|result| result.success())
                .map_err(|e| format!("Password authentication failed: {}", e)),
            AuthMethod::KeyFile(path) => authenticate_key(handle, username, path).await,
            AuthMethod::Agent => authenticate_agent(handle, username).await,
        }
    }
}

// Passwords never reach logs.
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(****)"),
            AuthMethod::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            AuthMethod::Agent => f.write_str("Agent"),
        }
    }
}

/// Credentials handed to a connection's default gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthMaterial {
    methods: Vec<AuthMethod>,
}

impl AuthMaterial {
    /// Empty material; resolves to agent authentication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append password authentication.
    ///
    /// # Arguments
    ///
    /// * `password` - Sent as-is; never logged
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.methods.push(AuthMethod::Password(password.into()));
        self
    }

    /// Append authentication with the private key at `key_path`.
    ///
    /// The key must not be passphrase-protected.
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.methods.push(AuthMethod::KeyFile(key_path.into()));
        self
    }

    /// Append authentication through the running SSH agent.
    pub fn with_agent(mut self) -> Self {
        self.methods.push(AuthMethod::Agent);
        self
    }

    /// True when no method was added explicitly.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods in the order they will be attempted.
    pub fn methods(&self) -> Vec<AuthMethod> {
        if self.methods.is_empty() {
            vec![AuthMethod::Agent]
        } else {
            self.methods.clone()
        }
    }

    /// Try each method in turn; the first accepted one wins.
    ///
    /// `Ok(false)` means every method was rejected by the server. `Err` is
    /// returned only when the last method failed for a reason other than
    /// rejection.
    pub(crate) async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        let mut last_error = None;

        for method in self.methods() {
            debug!("Trying authentication method: {}", method.name());

            match method.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authentication succeeded with method: {}", method.name());
                    return Ok(true);
                }
                Ok(false) => {
                    debug!("Authentication rejected for method: {}", method.name());
                    last_error = None;
                }
                Err(e) => {
                    debug!("Authentication error with method {}: {}", method.name(), e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }
}

async fn authenticate_key(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
    path: &Path,
) -> Result<bool, String> {
    let key_pair = keys::load_secret_key(path, None)
        .map_err(|e| format!("Failed to load private key from {:?}: {}", path, e))?;

    let hash_alg = handle
        .best_supported_rsa_hash()
        .await
        .ok()
        .flatten()
        .flatten();
    debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

    let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

    handle
        .authenticate_publickey(username, key_with_hash)
        .await
        .map(|result| result.success())
        .map_err(|e| format!("Key authentication failed: {}", e))
}

async fn authenticate_agent(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
) -> Result<bool, String> {
    let mut agent = keys::agent::client::AgentClient::connect_env()
        .await
        .map_err(|e| format!("Failed to connect to SSH agent: {}", e))?;

    let identities = agent
        .request_identities()
        .await
        .map_err(|e| format!("Failed to get identities from SSH agent: {}", e))?;

    if identities.is_empty() {
        return Err("No identities found in SSH agent".to_string());
    }

    for identity in identities {
        debug!("Trying SSH agent identity: {:?}", identity.comment());

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();

        match handle
            .authenticate_publickey_with(username, identity.clone(), hash_alg, &mut agent)
            .await
        {
            Ok(result) if result.success() => {
                info!("Authenticated {} with SSH agent", username);
                return Ok(true);
            }
            Ok(_) => debug!("Agent identity not accepted, trying next"),
            Err(e) => debug!("Agent authentication error: {}, trying next", e),
        }
    }

    Ok(false)
}
