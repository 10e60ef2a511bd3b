//! Transport gateways.
//!
//! - `traits`: the [`Gateway`] capability a connection drives
//! - `ssh`: [`SshGateway`], the russh-backed default
//! - `auth`: [`AuthMaterial`] handed to the default gateway
//! - `lines`: output chunk to line splitting

mod auth;
mod lines;
mod ssh;
mod traits;

#[cfg(test)]
pub(crate) mod scripted;

pub use auth::{AuthMaterial, AuthMethod};
pub use ssh::{SshClientHandler, SshGateway};
pub use traits::Gateway;
