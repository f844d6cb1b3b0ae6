use async_trait::async_trait;
use poolgate_proto::v1::{DirectorySession, TokenSet, UserProfile};

/// The token triple after the completeness check. Unlike the wire-level
/// [`TokenSet`], the access and id tokens are proven present here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

impl IssuedTokens {
    pub fn from_token_set(tokens: TokenSet) -> Option<Self> {
        match (tokens.access_token, tokens.id_token) {
            (Some(access_token), Some(id_token)) => Some(IssuedTokens {
                access_token,
                id_token,
                refresh_token: tokens.refresh_token,
            }),
            _ => None,
        }
    }
}

/// The verify hook's decision about a directory-validated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<U> {
    /// Map the principal to this application user.
    Accept { user: U, info: Option<String> },
    /// The principal is valid to the directory but not to this application.
    Reject { info: Option<String> },
}

/// The application-supplied hook that maps a validated external identity to
/// an application-level user.
///
/// Whether `session` is populated is declared once at construction with
/// `pass_session` rather than inspected per call - integrators that want the
/// raw directory session opt in explicitly.
///
/// Returning `Err` is fatal for the request: the strategy converts it to an
/// error outcome and never lets it escape into the request-handling layer.
#[async_trait]
pub trait Verify: Send + Sync {
    type User: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn verify(
        &self,
        tokens: &IssuedTokens,
        profile: &UserProfile,
        session: Option<DirectorySession>,
    ) -> Result<Verdict<Self::User>, Self::Error>;
}
