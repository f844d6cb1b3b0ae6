use std::collections::BTreeMap;
use std::fmt;

use poolgate_proto::v1::Credentials;
use serde::Deserialize;

/// The fields the strategy reads from an inbound request body. Host
/// frameworks deserialise their body format into this and hand it over.
///
/// Unknown body fields flatten into `attributes` so a password-reset
/// completion can supply the attribute values the directory demands.
#[derive(Deserialize, Clone, Default)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub newpassword: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl LoginForm {
    /// Both fields present and non-empty, or no credentials at all.
    pub(crate) fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => None,
        }
    }

    /// Pick the values for the attributes the directory listed as required.
    /// Attributes the form does not carry are simply omitted - the directory
    /// decides whether that is acceptable.
    pub(crate) fn challenge_attributes(&self, required: &[String]) -> BTreeMap<String, String> {
        required
            .iter()
            .filter_map(|name| {
                self.attributes
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "LoginForm {{ username: {:?}, password: _, newpassword: _, attributes: {:?} }}",
            self.username, self.attributes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LoginForm;

    #[test]
    fn test_credentials_require_both_fields_non_empty() {
        let form: LoginForm = serde_json::from_str(
            r#"{"username": "william", "password": "hunter2"}"#,
        )
        .expect("failed to deserialise");
        assert!(form.credentials().is_some());

        let empty_password: LoginForm =
            serde_json::from_str(r#"{"username": "william", "password": ""}"#)
                .expect("failed to deserialise");
        assert!(empty_password.credentials().is_none());

        let absent: LoginForm = serde_json::from_str(r#"{}"#).expect("failed to deserialise");
        assert!(absent.credentials().is_none());
    }

    #[test]
    fn test_extra_fields_flatten_into_attributes() {
        let form: LoginForm = serde_json::from_str(
            r#"{"username": "w", "password": "pw", "newpassword": "npw", "email": "w@example.com", "locale": "ja-JP"}"#,
        )
        .expect("failed to deserialise");

        assert_eq!(form.attributes.get("email").map(String::as_str), Some("w@example.com"));

        let picked = form.challenge_attributes(&["email".to_string(), "phone".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.get("email").map(String::as_str), Some("w@example.com"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let form: LoginForm =
            serde_json::from_str(r#"{"username": "w", "password": "hunter2", "newpassword": "hunter3"}"#)
                .expect("failed to deserialise");
        let repr = format!("{:?}", form);
        assert!(!repr.contains("hunter2"));
        assert!(!repr.contains("hunter3"));
    }
}
