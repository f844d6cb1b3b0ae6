use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

mod auth;

pub use self::auth::*;

/// Identifies which user directory and application-client context a login is
/// scoped to. Set once when the client is constructed, immutable after.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PoolDescriptor {
    pub pool_id: String,
    pub client_id: String,
    pub region: String,
}

impl PoolDescriptor {
    /// All three fields are mandatory and must be non-empty. The region has
    /// no implicit default so a misconfigured integration can never silently
    /// authenticate against the wrong deployment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_id.is_empty() {
            return Err(ConfigError::MissingPoolId);
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if self.region.is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        Ok(())
    }
}

impl fmt::Display for PoolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ pool: {}, client: {}, region: {} ]",
            self.pool_id, self.client_id, self.region
        )
    }
}

/// A username/password pair extracted from an inbound request body.
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Credentials {{ username: {}, password: _ }}", self.username)
    }
}

/// One name/value pair from the directory's attribute listing.
///
/// Older deployments emit upper-camel field names, newer ones lower-case.
/// Both shapes deserialise into this one type so nothing downstream has to
/// sniff the response shape.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    #[serde(rename = "name", alias = "Name")]
    pub name: String,
    #[serde(rename = "value", alias = "Value")]
    pub value: String,
}

/// A flat mapping of attribute name to value for an authenticated principal.
/// Constructed fresh per request, never persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub attrs: BTreeMap<String, String>,
}

impl UserProfile {
    /// Flatten an attribute sequence. Later duplicates win.
    pub fn from_attributes(attributes: Vec<UserAttribute>) -> Self {
        let attrs = attributes
            .into_iter()
            .map(|attr| (attr.name, attr.value))
            .collect();
        UserProfile { attrs }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---")?;
        self.attrs
            .iter()
            .try_for_each(|(k, v)| writeln!(f, "{}: {}", k, v))
    }
}

/// A failure reported by the directory service. The message and status are
/// passed through to the host application verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    pub message: String,
    pub status: u16,
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

/// Construction-time configuration faults. These surface when the strategy
/// or client is built, never on the first real request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pool id is required")]
    MissingPoolId,
    #[error("client id is required")]
    MissingClientId,
    #[error("region is required")]
    MissingRegion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_descriptor_validate() {
        let pool = PoolDescriptor {
            pool_id: "ap-northeast-1_eSjqLfqKc".to_string(),
            client_id: "vtvg02tr21zmxvspyvawtv09b".to_string(),
            region: "ap-northeast-1".to_string(),
        };
        assert!(pool.validate().is_ok());

        let no_region = PoolDescriptor {
            region: String::new(),
            ..pool.clone()
        };
        assert_eq!(no_region.validate(), Err(ConfigError::MissingRegion));

        let no_pool = PoolDescriptor {
            pool_id: String::new(),
            ..pool
        };
        assert_eq!(no_pool.validate(), Err(ConfigError::MissingPoolId));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "william".to_string(),
            password: "hunter2".to_string(),
        };
        let repr = format!("{:?}", creds);
        assert!(repr.contains("william"));
        assert!(!repr.contains("hunter2"));
    }

    #[test]
    fn test_user_attribute_accepts_both_shapes() {
        let upper: UserAttribute =
            serde_json::from_str(r#"{"Name": "email", "Value": "w@example.com"}"#)
                .expect("failed to deserialise");
        let lower: UserAttribute =
            serde_json::from_str(r#"{"name": "email", "value": "w@example.com"}"#)
                .expect("failed to deserialise");
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_profile_flatten_later_duplicates_win() {
        let profile = UserProfile::from_attributes(vec![
            UserAttribute {
                name: "email".to_string(),
                value: "old@example.com".to_string(),
            },
            UserAttribute {
                name: "email".to_string(),
                value: "new@example.com".to_string(),
            },
        ]);
        assert_eq!(profile.get("email"), Some("new@example.com"));
        assert_eq!(profile.attrs.len(), 1);
    }
}
