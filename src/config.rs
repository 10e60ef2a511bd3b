//! Configuration for the default SSH gateway.
//!
//! Values resolve with a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SSH_COMMAND_TIMEOUT` | 180s | Maximum wait for the next output chunk, in seconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `SSH_USER` | `$USER`, then `root` | Login user when the identity has none |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default wait for command output in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Login user when neither the identity nor the environment names one
pub(crate) const FALLBACK_USERNAME: &str = "root";

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";

pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";

pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

pub(crate) const USERNAME_ENV_VAR: &str = "SSH_USER";

/// Resolve a value with priority: parameter -> env var -> default.
///
/// Unparseable environment values are ignored.
fn resolve<T: FromStr>(param: Option<T>, env_var: &str, default: T) -> T {
    if let Some(value) = param {
        return value;
    }

    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.parse::<T>()
    {
        return value;
    }

    default
}

pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(resolve(
        timeout_param,
        CONNECT_TIMEOUT_ENV_VAR,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    ))
}

pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(resolve(
        timeout_param,
        COMMAND_TIMEOUT_ENV_VAR,
        DEFAULT_COMMAND_TIMEOUT_SECS,
    ))
}

/// Compression accepts `true`/`1` as enabled; any other set value disables it.
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Login user for identities that leave it unset: `SSH_USER`, `USER`, `root`.
pub(crate) fn resolve_username(username_param: Option<&str>) -> String {
    if let Some(username) = username_param.filter(|u| !u.is_empty()) {
        return username.to_string();
    }

    [USERNAME_ENV_VAR, "USER"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|u| !u.is_empty())
        .unwrap_or_else(|| FALLBACK_USERNAME.to_string())
}

/// Settings for [`SshGateway`](crate::gateway::SshGateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub compress: bool,
    /// Root for local-side paths used by `get`/`put`.
    pub local_root: PathBuf,
}

impl GatewayConfig {
    /// Resolve every setting from the environment, falling back to defaults.
    ///
    /// Reads `SSH_CONNECT_TIMEOUT`, `SSH_COMMAND_TIMEOUT` and `SSH_COMPRESSION`.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: resolve_connect_timeout(None),
            command_timeout: resolve_command_timeout(None),
            compress: resolve_compression(None),
            local_root: PathBuf::from("/"),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            compress: true,
            local_root: PathBuf::from("/"),
        }
    }
}
