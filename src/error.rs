//! Error taxonomy for remote connections.
//!
//! Nothing in this crate recovers locally: every failure surfaces to the
//! caller of the operation that hit it.
//!
//! - [`Error::InvalidIdentity`]: an identity was built without a usable host.
//! - [`Error::Connection`]: the gateway could not establish a live session
//!   after a single attempt. Never retried here.
//! - [`Error::Transfer`]: a get/put reported failure from the gateway.
//! - [`Error::Gateway`] / [`Error::Filesystem`]: collaborator errors passed
//!   through untranslated.

use std::io;

use thiserror::Error;

/// Failure reported by a [`Gateway`](crate::gateway::Gateway) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for GatewayError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for GatewayError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("unable to connect to remote server")]
    Connection {
        host: String,
        #[source]
        source: Option<GatewayError>,
    },

    #[error("transfer of {path} failed: {source}")]
    Transfer {
        path: String,
        #[source]
        source: GatewayError,
    },

    #[error("no command given")]
    EmptyCommand,

    #[error("no filesystem attached to this connection")]
    NoFilesystem,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Filesystem(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
