//! Remote execution connections.
//!
//! A [`Connection`] is one logical handle to a remote host. It connects
//! lazily through a [`Gateway`](gateway::Gateway), runs command sequences
//! while streaming their output line by line, reports exit status, moves
//! files, and carries a set of role tags so an orchestrator can address
//! "every connection with role X".
//!
//! - `identity`: [`ConnectionIdentity`], the immutable target description
//! - `command`: [`CommandSequence`] and [`ExitStatus`]
//! - `connection`: [`Connection`] itself
//! - `gateway`: the transport seam and the default [`SshGateway`](gateway::SshGateway)
//! - `filesystem`: local filesystem collaborator
//! - `sink`: progress message sinks
//! - `config`: environment-driven gateway settings
//! - `error`: error taxonomy

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod filesystem;
pub mod gateway;
pub mod identity;
pub mod sink;

pub use command::{CommandSequence, ExitStatus};
pub use config::GatewayConfig;
pub use connection::Connection;
pub use error::{Error, GatewayError, Result};
pub use filesystem::{Filesystem, LocalFilesystem};
pub use gateway::{AuthMaterial, Gateway, SshGateway};
pub use identity::{ConnectionIdentity, Roles};
pub use sink::{NullSink, OutputSink, TracingSink};
