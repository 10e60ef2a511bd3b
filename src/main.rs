#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::env;
use std::error::Error;
use std::process::ExitCode;

use dotenv::dotenv;
use remote_conn::{AuthMaterial, Connection, ConnectionIdentity, TracingSink};
use tracing::{error, info};

/// JSON file holding a serialized `ConnectionIdentity`
const IDENTITY_FILE_ENV_VAR: &str = "REMOTE_IDENTITY_FILE";
const HOST_ENV_VAR: &str = "REMOTE_HOST";
const NAME_ENV_VAR: &str = "REMOTE_NAME";
const USER_ENV_VAR: &str = "REMOTE_USER";
/// Comma separated role tags
const ROLES_ENV_VAR: &str = "REMOTE_ROLES";
const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";
const KEY_PATH_ENV_VAR: &str = "SSH_KEY_PATH";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    dotenv().ok();

    // Logs go to stderr so stdout carries only remote output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let commands: Vec<String> = env::args().skip(1).collect();
    if commands.is_empty() {
        eprintln!("usage: remote-run <command> [<command>...]");
        return Ok(ExitCode::from(2));
    }

    let identity = load_identity()?;
    let mut conn = Connection::new(identity, load_auth())?;
    conn.set_output_sink(TracingSink);

    if let Err(e) = conn
        .run_with(commands, |line, c| println!("[{}] {}", c.name(), line))
        .await
    {
        error!("'{}' failed: {}", conn.name(), e);
        return Ok(ExitCode::FAILURE);
    }

    let status = conn.status();
    info!("'{}' {}", conn.name(), status);

    Ok(match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None if status.success() => ExitCode::SUCCESS,
        None => ExitCode::FAILURE,
    })
}

/// Identity from `REMOTE_IDENTITY_FILE`, or assembled from `REMOTE_*` vars.
fn load_identity() -> Result<ConnectionIdentity, Box<dyn Error>> {
    if let Ok(path) = env::var(IDENTITY_FILE_ENV_VAR) {
        let raw = std::fs::read_to_string(&path)?;
        return Ok(serde_json::from_str(&raw)?);
    }

    let host = env::var(HOST_ENV_VAR)
        .map_err(|_| format!("{} or {} must be set", HOST_ENV_VAR, IDENTITY_FILE_ENV_VAR))?;
    let name = env::var(NAME_ENV_VAR).unwrap_or_else(|_| host.clone());

    let mut identity = ConnectionIdentity::new(name, host)?;
    if let Ok(user) = env::var(USER_ENV_VAR) {
        identity = identity.with_username(user);
    }
    if let Ok(roles) = env::var(ROLES_ENV_VAR) {
        identity = identity.with_roles(
            roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty()),
        );
    }
    Ok(identity)
}

/// Password and key from the environment; the agent when neither is set.
fn load_auth() -> AuthMaterial {
    let mut auth = AuthMaterial::new();
    if let Ok(password) = env::var(PASSWORD_ENV_VAR) {
        auth = auth.with_password(password);
    }
    if let Ok(key_path) = env::var(KEY_PATH_ENV_VAR) {
        auth = auth.with_key(key_path);
    }
    auth
}
