//! The outcome surface the host framework consumes. Every authenticate call
//! resolves to exactly one of success, failure or error.

use std::fmt;

use poolgate_client::ClientError;
use poolgate_proto::v1::{DirectoryError, MfaDelivery};
use thiserror::Error;

/// Why an authentication attempt failed, with the status code each kind maps
/// to. The mapping is enumerated here rather than scattered through the flow
/// so the codes consumers see are an explicit contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Username or password absent or empty. Rejected before any directory
    /// contact.
    MissingCredentials,
    /// The directory reported success but withheld an access or id token.
    MissingToken,
    /// The directory rejected the login; its status is passed through.
    Denied { status: u16 },
    /// The attribute fetch failed; the directory's status is passed through.
    AttributeFetch { status: u16 },
    /// A second factor must be completed via a separate flow.
    MfaRequired,
    /// A forced password reset must be completed before tokens are issued.
    NewPasswordRequired,
    /// The verify hook declined to map the principal to an application user.
    NotVerified,
}

impl FailureKind {
    pub fn status_code(&self) -> u16 {
        match self {
            FailureKind::MissingCredentials | FailureKind::MissingToken => 400,
            FailureKind::Denied { status } | FailureKind::AttributeFetch { status } => *status,
            FailureKind::MfaRequired => 424,
            FailureKind::NewPasswordRequired => 412,
            FailureKind::NotVerified => 401,
        }
    }
}

/// A terminal non-success, non-fatal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    pub kind: FailureKind,
}

impl Rejection {
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub(crate) fn missing_credentials() -> Self {
        Rejection {
            message: "Missing credentials".to_string(),
            kind: FailureKind::MissingCredentials,
        }
    }

    pub(crate) fn missing_token() -> Self {
        Rejection {
            message: "Missing token".to_string(),
            kind: FailureKind::MissingToken,
        }
    }

    pub(crate) fn denied(err: DirectoryError) -> Self {
        Rejection {
            kind: FailureKind::Denied { status: err.status },
            message: err.message,
        }
    }

    pub(crate) fn attribute_fetch(err: DirectoryError) -> Self {
        Rejection {
            kind: FailureKind::AttributeFetch { status: err.status },
            message: err.message,
        }
    }

    pub(crate) fn mfa_required(delivery: &MfaDelivery) -> Self {
        Rejection {
            message: format!("Multi-factor completion required - {}", delivery),
            kind: FailureKind::MfaRequired,
        }
    }

    pub(crate) fn new_password_required() -> Self {
        Rejection {
            message: "New password required".to_string(),
            kind: FailureKind::NewPasswordRequired,
        }
    }

    pub(crate) fn not_verified(info: Option<String>) -> Self {
        Rejection {
            message: info.unwrap_or_else(|| "Not authorised".to_string()),
            kind: FailureKind::NotVerified,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status_code())
    }
}

/// Fatal faults the host framework should surface as an unrecoverable
/// failure for the request, not as an authentication rejection.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("directory client error: {0:?}")]
    Client(ClientError),
    #[error("verify hook error: {0}")]
    Verify(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// What the strategy hands back to the host framework, mapping onto its
/// success/fail/error protocol.
#[derive(Debug)]
pub enum AuthOutcome<U> {
    Success { user: U, info: Option<String> },
    Failure(Rejection),
    Error(AuthError),
}

impl<U> AuthOutcome<U> {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::FailureKind;

    #[test]
    fn test_failure_status_mapping() {
        assert_eq!(FailureKind::MissingCredentials.status_code(), 400);
        assert_eq!(FailureKind::MissingToken.status_code(), 400);
        assert_eq!(FailureKind::MfaRequired.status_code(), 424);
        assert_eq!(FailureKind::NewPasswordRequired.status_code(), 412);
        assert_eq!(FailureKind::NotVerified.status_code(), 401);
        assert_eq!(FailureKind::Denied { status: 429 }.status_code(), 429);
        assert_eq!(FailureKind::AttributeFetch { status: 403 }.status_code(), 403);
    }
}
