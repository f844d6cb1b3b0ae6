//! Request authentication by delegation to a user-pool directory service.
//!
//! The strategy extracts credentials from an inbound request body, submits a
//! pool-scoped login to the directory, interprets the terminal outcome or
//! challenge, fetches the authenticated principal's profile, and asks the
//! application's verify hook whether to accept the principal. The host
//! framework receives exactly one of success, failure or error per attempt.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]

#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use poolgate_client::{ClientError, DirectoryClient, PoolClient, PoolClientBuilder};
use poolgate_proto::v1::{
    ConfigError, DirectoryError, DirectorySession, LoginOutcome, PoolDescriptor, TokenSet,
    UserProfile,
};

mod form;
mod outcome;
mod verify;

pub use crate::form::LoginForm;
pub use crate::outcome::{AuthError, AuthOutcome, FailureKind, Rejection};
pub use crate::verify::{IssuedTokens, Verdict, Verify};

pub const STRATEGY_NAME: &str = "poolgate";

/// Construction-time faults. These are raised when the strategy is built so
/// a misconfigured integration fails at startup, never on the first real
/// request.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("client construction failed: {0:?}")]
    Client(ClientError),
}

/// Builds a [`Strategy`] backed by the HTTP directory client.
#[derive(Debug, Clone, Default)]
pub struct StrategyBuilder {
    pool_id: Option<String>,
    client_id: Option<String>,
    region: Option<String>,
    address: Option<String>,
    config_path: Option<PathBuf>,
    pass_session: bool,
}

impl StrategyBuilder {
    pub fn new() -> Self {
        StrategyBuilder::default()
    }

    pub fn pool_id<S: Into<String>>(self, pool_id: S) -> Self {
        StrategyBuilder {
            pool_id: Some(pool_id.into()),
            ..self
        }
    }

    pub fn client_id<S: Into<String>>(self, client_id: S) -> Self {
        StrategyBuilder {
            client_id: Some(client_id.into()),
            ..self
        }
    }

    pub fn region<S: Into<String>>(self, region: S) -> Self {
        StrategyBuilder {
            region: Some(region.into()),
            ..self
        }
    }

    /// Override the derived directory address.
    pub fn address<S: Into<String>>(self, address: S) -> Self {
        StrategyBuilder {
            address: Some(address.into()),
            ..self
        }
    }

    /// Declare that the verify hook wants the raw directory session. This
    /// stands in for the variable-arity hook signatures some integrations
    /// use - the choice is explicit configuration, not runtime inspection.
    pub fn pass_session(self, pass_session: bool) -> Self {
        StrategyBuilder {
            pass_session,
            ..self
        }
    }

    /// Merge client options from an optional TOML config file at build time.
    /// Explicit builder settings take precedence.
    pub fn client_config<P: Into<PathBuf>>(self, config_path: P) -> Self {
        StrategyBuilder {
            config_path: Some(config_path.into()),
            ..self
        }
    }

    /// Validate the configuration and construct the strategy. A missing or
    /// empty pool id, client id or region fails here.
    pub fn build<V: Verify>(self, verify: V) -> Result<Strategy<PoolClient, V>, StrategyError> {
        let pool = PoolDescriptor {
            pool_id: self.pool_id.unwrap_or_default(),
            client_id: self.client_id.unwrap_or_default(),
            region: self.region.unwrap_or_default(),
        };
        pool.validate()?;

        let mut client_builder = PoolClientBuilder::new().pool(pool);
        if let Some(config_path) = self.config_path {
            client_builder = client_builder
                .read_options_from_optional_config(config_path)
                .map_err(StrategyError::Client)?;
        }
        if let Some(address) = self.address {
            client_builder = client_builder.address(address);
        }

        let client = client_builder.build().map_err(StrategyError::Client)?;

        Ok(Strategy {
            client,
            verify,
            pass_session: self.pass_session,
        })
    }
}

/// The authentication adapter. Holds only the immutable directory client,
/// the verify hook and the session flag, so one instance safely serves
/// concurrent requests; every wait is an await point.
#[derive(Debug)]
pub struct Strategy<C, V> {
    client: C,
    verify: V,
    pass_session: bool,
}

impl<C, V> Strategy<C, V>
where
    C: DirectoryClient + Send + Sync,
    V: Verify,
{
    /// Construct over any [`DirectoryClient`]. Integrators with their own
    /// transport (and the test suite) come through here.
    pub fn with_client(client: C, verify: V, pass_session: bool) -> Self {
        Strategy {
            client,
            verify,
            pass_session,
        }
    }

    pub fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    /// Authenticate one inbound request. Always resolves to exactly one
    /// outcome; no directory state outlives the call.
    pub async fn authenticate(&self, form: &LoginForm) -> AuthOutcome<V::User> {
        let credentials = match form.credentials() {
            Some(credentials) => credentials,
            None => {
                debug!("request rejected before directory contact - missing credentials");
                return AuthOutcome::Failure(Rejection::missing_credentials());
            }
        };

        let response = match self.client.login(&credentials).await {
            Ok(response) => response,
            Err(e) => return self.map_client_error(e, false),
        };

        let mut sessionid = response.sessionid;
        let mut outcome = response.outcome;

        // A forced password reset can be completed inline when the request
        // carries a new password. The completion reuses the login session
        // and resolves through the same terminal branches below; any further
        // challenge it raises is terminal.
        if let LoginOutcome::NewPasswordRequired {
            required_attributes,
            ..
        } = &outcome
        {
            let new_password = match form.newpassword.as_deref().filter(|np| !np.is_empty()) {
                Some(new_password) => new_password,
                None => {
                    debug!("new password required for {}", credentials.username);
                    return AuthOutcome::Failure(Rejection::new_password_required());
                }
            };

            let attributes = form.challenge_attributes(required_attributes);
            debug!(
                "completing new password challenge for {} - session {}",
                credentials.username, sessionid
            );

            let completion = match self
                .client
                .complete_new_password(
                    credentials.username.as_str(),
                    sessionid,
                    new_password,
                    &attributes,
                )
                .await
            {
                Ok(completion) => completion,
                Err(e) => return self.map_client_error(e, false),
            };

            sessionid = completion.sessionid;
            outcome = completion.outcome;
        }

        match outcome {
            LoginOutcome::Success(tokens) => self.verify_principal(sessionid, *tokens).await,
            LoginOutcome::Denied(err) => {
                debug!("directory denied login for {} - {}", credentials.username, err);
                AuthOutcome::Failure(Rejection::denied(err))
            }
            LoginOutcome::MfaRequired(delivery) => {
                debug!("mfa required for {} - {}", credentials.username, delivery);
                AuthOutcome::Failure(Rejection::mfa_required(&delivery))
            }
            LoginOutcome::NewPasswordRequired { .. } => {
                AuthOutcome::Failure(Rejection::new_password_required())
            }
        }
    }

    async fn verify_principal(&self, sessionid: Uuid, tokens: TokenSet) -> AuthOutcome<V::User> {
        let issued = match IssuedTokens::from_token_set(tokens) {
            Some(issued) => issued,
            None => {
                warn!("directory reported success without issuing tokens");
                return AuthOutcome::Failure(Rejection::missing_token());
            }
        };

        let attributes = match self.client.fetch_attributes(issued.access_token.as_str()).await {
            Ok(attributes) => attributes,
            Err(e) => return self.map_client_error(e, true),
        };
        let profile = UserProfile::from_attributes(attributes);

        let session = if self.pass_session {
            Some(DirectorySession { sessionid })
        } else {
            None
        };

        match self.verify.verify(&issued, &profile, session).await {
            Ok(Verdict::Accept { user, info }) => AuthOutcome::Success { user, info },
            Ok(Verdict::Reject { info }) => AuthOutcome::Failure(Rejection::not_verified(info)),
            Err(e) => AuthOutcome::Error(AuthError::Verify(Box::new(e))),
        }
    }

    /// Directory-reported failures become rejections with the directory's
    /// message and status passed through; transport and decode faults are
    /// fatal for the request.
    fn map_client_error(&self, e: ClientError, attribute_fetch: bool) -> AuthOutcome<V::User> {
        match e {
            ClientError::Http(_, Some(err), opid) => {
                debug!("directory rejected request - eventid {}", opid);
                if attribute_fetch {
                    AuthOutcome::Failure(Rejection::attribute_fetch(err))
                } else {
                    AuthOutcome::Failure(Rejection::denied(err))
                }
            }
            ClientError::Http(status, None, opid) => {
                debug!(
                    "directory returned {} with no error body - eventid {}",
                    status, opid
                );
                let err = DirectoryError {
                    message: "Authentication failed".to_string(),
                    status: status.as_u16(),
                };
                if attribute_fetch {
                    AuthOutcome::Failure(Rejection::attribute_fetch(err))
                } else {
                    AuthOutcome::Failure(Rejection::denied(err))
                }
            }
            e => {
                error!("directory client fault - {:?}", e);
                AuthOutcome::Error(AuthError::Client(e))
            }
        }
    }
}
