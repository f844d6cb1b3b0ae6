use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::{Credentials, DirectoryError, PoolDescriptor};

// Login against a pool is single-shot: the client submits the credentials
// scoped to a pool descriptor and the directory answers with a terminal
// outcome or a challenge. Challenges are not resolved by stepping within the
// same call - the caller completes them through a distinct request correlated
// by the session id.

/// The token material issued on a successful login. All fields are optional
/// on the wire: upstream has been observed to report success while omitting
/// tokens, and the adapter checks for that rather than trusting the report.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenSet {
    /// A success outcome is only usable when both the access and id tokens
    /// were actually issued.
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.id_token.is_some()
    }
}

/// Where the directory delivered (or will deliver) a second factor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MfaDelivery {
    pub medium: String,
    pub destination: String,
}

impl fmt::Display for MfaDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.medium, self.destination)
    }
}

/// Submit credentials for a pool-scoped login.
#[derive(Serialize, Deserialize, Clone)]
pub struct LoginRequest {
    pub pool: PoolDescriptor,
    pub credentials: Credentials,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "LoginRequest {{ pool: {}, credentials: {:?} }}",
            self.pool, self.credentials
        )
    }
}

/// Complete a forced password reset raised by a previous login. Correlated
/// to that login by the session id header, not by a body field.
#[derive(Serialize, Deserialize, Clone)]
pub struct ChallengeCompletionRequest {
    pub pool: PoolDescriptor,
    pub username: String,
    pub new_password: String,
    pub attributes: BTreeMap<String, String>,
}

impl fmt::Debug for ChallengeCompletionRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "ChallengeCompletionRequest {{ pool: {}, username: {}, new_password: _, attributes: {:?} }}",
            self.pool, self.username, self.attributes
        )
    }
}

/// The terminal state of one login attempt, consumed once and discarded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoginOutcome {
    /// Credentials accepted, tokens issued.
    Success(Box<TokenSet>),
    /// Credentials (or the pool/client scope) rejected.
    Denied(DirectoryError),
    /// A second factor must be completed before tokens are issued.
    MfaRequired(MfaDelivery),
    /// The directory demands a password change before it will issue tokens.
    NewPasswordRequired {
        current_attributes: BTreeMap<String, String>,
        required_attributes: Vec<String>,
    },
}

/// The directory's response envelope. The session id is the raw handle a
/// host application can use to drive challenge flows itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginResponse {
    pub sessionid: Uuid,
    pub outcome: LoginOutcome,
}

/// An opaque reference to the directory-side login session, handed to the
/// verify hook only when the integrator declared interest at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectorySession {
    pub sessionid: Uuid,
}
