//! Immutable description of a remote target.
//!
//! An identity is produced by whatever resolves credentials and inventory
//! before a [`Connection`](crate::Connection) exists, and is then owned by
//! exactly one connection for its whole lifetime.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Set of role tags a connection belongs to.
pub type Roles = BTreeSet<String>;

/// Named remote target: host address, login user and role tags.
///
/// Equality and hashing use `name` only, so registries can key on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IdentityRecord")]
pub struct ConnectionIdentity {
    name: String,
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    roles: Roles,
}

/// Unvalidated wire form; every deserialized identity passes through
/// [`ConnectionIdentity::new`].
#[derive(Deserialize)]
struct IdentityRecord {
    name: String,
    host: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

impl TryFrom<IdentityRecord> for ConnectionIdentity {
    type Error = Error;

    fn try_from(record: IdentityRecord) -> Result<Self> {
        let identity = Self::new(record.name, record.host)?.with_roles(record.roles);
        Ok(match record.username {
            Some(username) => identity.with_username(username),
            None => identity,
        })
    }
}

impl ConnectionIdentity {
    /// Create an identity for `host`, displayed as `name`.
    ///
    /// Fails with [`Error::InvalidIdentity`] when `host` is empty or blank.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let host = host.into();
        if host.trim().is_empty() {
            return Err(Error::InvalidIdentity(format!(
                "host is required for '{}'",
                name
            )));
        }
        Ok(Self {
            name,
            host,
            username: None,
            roles: Roles::new(),
        })
    }

    /// Set the login user. An empty string means "use the gateway default".
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = (!username.is_empty()).then_some(username);
        self
    }

    /// Replace the role tags. Duplicates collapse.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Login user; `None` means the gateway default.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }
}

impl PartialEq for ConnectionIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ConnectionIdentity {}

impl Hash for ConnectionIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod construction {
        use super::*;

        #[test]
        fn test_empty_host_is_rejected() {
            let result = ConnectionIdentity::new("prod-1", "");
            assert!(matches!(result, Err(Error::InvalidIdentity(_))));
        }

        #[test]
        fn test_blank_host_is_rejected() {
            let result = ConnectionIdentity::new("prod-1", "   ");
            assert!(matches!(result, Err(Error::InvalidIdentity(_))));
        }

        #[test]
        fn test_full_identity() {
            let identity = ConnectionIdentity::new("prod-1", "10.0.0.5")
                .unwrap()
                .with_username("deploy")
                .with_roles(["web", "db"]);

            assert_eq!(identity.name(), "prod-1");
            assert_eq!(identity.host(), "10.0.0.5");
            assert_eq!(identity.username(), Some("deploy"));
            assert!(identity.roles().contains("web"));
            assert!(identity.roles().contains("db"));
            assert_eq!(identity.roles().len(), 2);
        }

        #[test]
        fn test_empty_username_means_default() {
            let identity = ConnectionIdentity::new("prod-1", "10.0.0.5")
                .unwrap()
                .with_username("");
            assert_eq!(identity.username(), None);
        }

        #[test]
        fn test_duplicate_roles_collapse() {
            let identity = ConnectionIdentity::new("prod-1", "10.0.0.5")
                .unwrap()
                .with_roles(["web", "web"]);
            assert_eq!(identity.roles().len(), 1);
        }
    }

    mod equality {
        use super::*;

        #[test]
        fn test_equal_by_name_only() {
            let a = ConnectionIdentity::new("prod-1", "10.0.0.5").unwrap();
            let b = ConnectionIdentity::new("prod-1", "10.0.0.6")
                .unwrap()
                .with_roles(["db"]);
            assert_eq!(a, b);
        }

        #[test]
        fn test_usable_as_map_key() {
            let mut registry = HashMap::new();
            registry.insert(
                ConnectionIdentity::new("prod-1", "10.0.0.5").unwrap(),
                1,
            );
            registry.insert(
                ConnectionIdentity::new("prod-1", "10.0.0.9").unwrap(),
                2,
            );
            assert_eq!(registry.len(), 1);
        }
    }

    mod serde_form {
        use super::*;

        #[test]
        fn test_deserialize_identity() {
            let json = r#"{"name":"prod-1","host":"10.0.0.5","username":"deploy","roles":["web","db"]}"#;
            let identity: ConnectionIdentity = serde_json::from_str(json).unwrap();
            assert_eq!(identity.name(), "prod-1");
            assert_eq!(identity.username(), Some("deploy"));
            assert!(identity.roles().contains("db"));
        }

        #[test]
        fn test_deserialize_without_optional_fields() {
            let json = r#"{"name":"prod-1","host":"10.0.0.5"}"#;
            let identity: ConnectionIdentity = serde_json::from_str(json).unwrap();
            assert_eq!(identity.username(), None);
            assert!(identity.roles().is_empty());
        }

        #[test]
        fn test_deserialize_rejects_empty_host() {
            let json = r#"{"name":"prod-1","host":""}"#;
            let result: Result<ConnectionIdentity, _> = serde_json::from_str(json);
            let err = result.unwrap_err();
            assert!(err.to_string().contains("host is required"));
        }

        #[test]
        fn test_serialize_skips_absent_username() {
            let identity = ConnectionIdentity::new("prod-1", "10.0.0.5").unwrap();
            let value = serde_json::to_value(&identity).unwrap();
            assert!(value.get("username").is_none());
            assert!(value.get("roles").is_none());
            assert_eq!(value["host"], "10.0.0.5");
        }
    }
}
