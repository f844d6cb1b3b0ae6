//! Client SDK for the user-pool directory service. `DirectoryClient` is the
//! seam the authentication strategy consumes; `PoolClient` is the HTTP/JSON
//! implementation of that seam.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::time::Duration;

use async_trait::async_trait;
use poolgate_proto::constants::{
    default_address, APPLICATION_JSON, H_OPID, H_SESSIONID, V1_AUTH, V1_AUTH_CHALLENGE,
    V1_SELF_ATTRIBUTES,
};
use poolgate_proto::v1::{
    ChallengeCompletionRequest, Credentials, DirectoryError, LoginRequest, LoginResponse,
    PoolDescriptor, UserAttribute,
};
use reqwest::header::CONTENT_TYPE;
pub use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Error as SerdeJsonError;
use url::Url;
use uuid::Uuid;

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::StatusCode, Option<DirectoryError>, String),
    Transport(reqwest::Error),
    JsonDecode(reqwest::Error, String),
    JsonEncode(SerdeJsonError),
    ConfigParseIssue(String),
    CertParseIssue(String),
}

/// The operations the strategy needs from the directory. Kept as a trait so
/// hosts can substitute another transport, and so tests can run against an
/// in-process fake.
#[async_trait]
pub trait DirectoryClient {
    /// Submit a pool-scoped credential login. One network round trip.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError>;

    /// Complete a forced password reset raised by a previous login, reusing
    /// that login's session.
    async fn complete_new_password(
        &self,
        username: &str,
        sessionid: Uuid,
        new_password: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<LoginResponse, ClientError>;

    /// Retrieve the attribute listing for the holder of an access token.
    async fn fetch_attributes(
        &self,
        access_token: &str,
    ) -> Result<Vec<UserAttribute>, ClientError>;
}

/// Optional on-disk client configuration. Anything set here can be overridden
/// by explicit builder calls.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PoolClientConfig {
    pub uri: Option<String>,
    pub verify_ca: Option<bool>,
    pub verify_hostnames: Option<bool>,
    pub ca_path: Option<String>,
    pub connect_timeout: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PoolClientBuilder {
    pool: Option<PoolDescriptor>,
    address: Option<String>,
    verify_ca: bool,
    verify_hostnames: bool,
    ca: Option<reqwest::Certificate>,
    connect_timeout: Option<u64>,
    use_system_proxies: bool,
}

impl Default for PoolClientBuilder {
    fn default() -> Self {
        PoolClientBuilder::new()
    }
}

impl Display for PoolClientBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.pool {
            Some(value) => writeln!(f, "pool: {}", value)?,
            None => writeln!(f, "pool: unset")?,
        }
        match &self.address {
            Some(value) => writeln!(f, "address: {}", value)?,
            None => writeln!(f, "address: unset")?,
        }
        writeln!(f, "verify_ca: {}", self.verify_ca)?;
        writeln!(f, "verify_hostnames: {}", self.verify_hostnames)?;
        match self.connect_timeout {
            Some(value) => writeln!(f, "connect_timeout: {}", value)?,
            None => writeln!(f, "connect_timeout: unset")?,
        }
        writeln!(f, "use_system_proxies: {}", self.use_system_proxies)
    }
}

impl PoolClientBuilder {
    pub fn new() -> Self {
        PoolClientBuilder {
            pool: None,
            address: None,
            verify_ca: true,
            verify_hostnames: true,
            ca: None,
            connect_timeout: None,
            use_system_proxies: true,
        }
    }

    pub fn pool(self, pool: PoolDescriptor) -> Self {
        PoolClientBuilder {
            pool: Some(pool),
            ..self
        }
    }

    pub fn address(self, address: String) -> Self {
        PoolClientBuilder {
            address: Some(address),
            ..self
        }
    }

    pub fn danger_accept_invalid_hostnames(self, accept_invalid_hostnames: bool) -> Self {
        PoolClientBuilder {
            // We have to flip the bool state here due to english language.
            verify_hostnames: !accept_invalid_hostnames,
            ..self
        }
    }

    pub fn danger_accept_invalid_certs(self, accept_invalid_certs: bool) -> Self {
        PoolClientBuilder {
            // We have to flip the bool state here due to english language.
            verify_ca: !accept_invalid_certs,
            ..self
        }
    }

    pub fn connect_timeout(self, secs: u64) -> Self {
        PoolClientBuilder {
            connect_timeout: Some(secs),
            ..self
        }
    }

    pub fn no_proxy(self) -> Self {
        PoolClientBuilder {
            use_system_proxies: false,
            ..self
        }
    }

    fn parse_certificate(ca_path: &str) -> Result<reqwest::Certificate, ClientError> {
        let mut buf = Vec::new();
        let mut f = File::open(ca_path).map_err(|e| {
            error!("{:?}", e);
            ClientError::ConfigParseIssue(format!("{:?}", e))
        })?;
        f.read_to_end(&mut buf).map_err(|e| {
            error!("{:?}", e);
            ClientError::ConfigParseIssue(format!("{:?}", e))
        })?;
        reqwest::Certificate::from_pem(&buf).map_err(|e| {
            error!("{:?}", e);
            ClientError::CertParseIssue(format!("{:?}", e))
        })
    }

    pub fn add_root_certificate_filepath(self, ca_path: &str) -> Result<Self, ClientError> {
        let ca = Self::parse_certificate(ca_path)?;
        Ok(PoolClientBuilder {
            ca: Some(ca),
            ..self
        })
    }

    fn apply_config_options(self, pcc: PoolClientConfig) -> Result<Self, ClientError> {
        // Process and apply all our options if they exist.
        let address = match pcc.uri {
            Some(uri) => Some(uri),
            None => {
                debug!("No URI in config supplied to apply_config_options");
                self.address
            }
        };
        let verify_ca = pcc.verify_ca.unwrap_or(self.verify_ca);
        let verify_hostnames = pcc.verify_hostnames.unwrap_or(self.verify_hostnames);
        let ca = match pcc.ca_path {
            Some(ca_path) => Some(Self::parse_certificate(ca_path.as_str())?),
            None => self.ca,
        };
        let connect_timeout = pcc.connect_timeout.or(self.connect_timeout);

        Ok(PoolClientBuilder {
            pool: self.pool,
            address,
            verify_ca,
            verify_hostnames,
            ca,
            connect_timeout,
            use_system_proxies: self.use_system_proxies,
        })
    }

    /// Merge options from an optional TOML config file. A missing file is
    /// skipped silently so packaged defaults keep working.
    pub fn read_options_from_optional_config<P: AsRef<std::path::Path> + std::fmt::Debug>(
        self,
        config_path: P,
    ) -> Result<Self, ClientError> {
        debug!("Attempting to load configuration from {:#?}", &config_path);

        if !config_path.as_ref().exists() {
            debug!("{:?} does not exist", config_path);
            return Ok(self);
        };

        let mut f = match File::open(&config_path) {
            Ok(f) => f,
            Err(e) => {
                match e.kind() {
                    ErrorKind::PermissionDenied => {
                        warn!(
                            "Permission denied loading configuration file {:#?}, skipping.",
                            &config_path
                        );
                    }
                    _ => {
                        debug!(
                            "Unable to open config file {:#?} [{:?}], skipping ...",
                            &config_path, e
                        );
                    }
                };
                return Ok(self);
            }
        };

        let mut contents = String::new();
        f.read_to_string(&mut contents).map_err(|e| {
            error!("{:?}", e);
            ClientError::ConfigParseIssue(format!("{:?}", e))
        })?;

        let config: PoolClientConfig = toml::from_str(contents.as_str()).map_err(|e| {
            error!("{:?}", e);
            ClientError::ConfigParseIssue(format!("{:?}", e))
        })?;

        self.apply_config_options(config)
    }

    fn display_warnings(&self, address: &str) {
        if !self.verify_ca {
            warn!("verify_ca set to false in client configuration - this may allow network interception of passwords!");
        }
        if !self.verify_hostnames {
            warn!("verify_hostnames set to false in client configuration - this may allow network interception of passwords!");
        }
        if !address.starts_with("https://") {
            warn!("Address does not start with 'https://' - this may allow network interception of passwords!");
        }
    }

    /// Generates a useragent header based on the package name and version.
    pub fn user_agent() -> &'static str {
        static APP_USER_AGENT: &str =
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
        APP_USER_AGENT
    }

    /// Build the client ready for usage. The pool descriptor is mandatory and
    /// must be complete - misconfiguration fails here, not on first request.
    pub fn build(self) -> Result<PoolClient, ClientError> {
        let pool = match &self.pool {
            Some(pool) => {
                pool.validate()
                    .map_err(|e| ClientError::ConfigParseIssue(e.to_string()))?;
                pool.clone()
            }
            None => {
                error!("pool descriptor missing from client configuration, cannot continue client startup.");
                return Err(ClientError::ConfigParseIssue(
                    "pool descriptor is required".to_string(),
                ));
            }
        };

        let address = match &self.address {
            Some(a) => a.clone(),
            None => default_address(pool.region.as_str()),
        };

        self.display_warnings(address.as_str());

        let client_builder = reqwest::Client::builder()
            .user_agent(PoolClientBuilder::user_agent())
            .cookie_store(true)
            .danger_accept_invalid_hostnames(!self.verify_hostnames)
            .danger_accept_invalid_certs(!self.verify_ca);

        let client_builder = match self.use_system_proxies {
            true => client_builder,
            false => client_builder.no_proxy(),
        };

        let client_builder = match &self.ca {
            Some(cert) => client_builder.add_root_certificate(cert.clone()),
            None => client_builder,
        };

        let client_builder = match &self.connect_timeout {
            Some(secs) => client_builder
                .connect_timeout(Duration::from_secs(*secs))
                .timeout(Duration::from_secs(*secs)),
            None => client_builder,
        };

        let client = client_builder.build().map_err(ClientError::Transport)?;

        let uri = Url::parse(&address)
            .map_err(|e| ClientError::ConfigParseIssue(format!("invalid address - {:?}", e)))?;
        let origin = Url::parse(&uri.origin().ascii_serialization())
            .map_err(|e| ClientError::ConfigParseIssue(format!("invalid origin - {:?}", e)))?;

        Ok(PoolClient {
            client,
            addr: address,
            origin,
            pool,
            builder: self,
        })
    }
}

#[derive(Debug)]
pub struct PoolClient {
    client: reqwest::Client,
    addr: String,
    origin: Url,
    pool: PoolDescriptor,
    builder: PoolClientBuilder,
}

impl PoolClient {
    pub fn get_origin(&self) -> &Url {
        &self.origin
    }

    pub fn get_url(&self) -> &str {
        self.addr.as_str()
    }

    pub fn get_pool(&self) -> &PoolDescriptor {
        &self.pool
    }

    /// A fresh client with the same configuration but no shared connection
    /// or cookie state.
    pub fn new_session(&self) -> Result<Self, ClientError> {
        let builder = self.builder.clone();
        builder.build()
    }

    async fn perform_auth_post_request<R: Serialize, T: DeserializeOwned>(
        &self,
        dest: &str,
        request: &R,
        sessionid: Option<Uuid>,
    ) -> Result<T, ClientError> {
        let dest = format!("{}{}", self.get_url(), dest);

        let req_string = serde_json::to_string(request).map_err(ClientError::JsonEncode)?;

        let response = self
            .client
            .post(dest.as_str())
            .body(req_string)
            .header(CONTENT_TYPE, APPLICATION_JSON);

        // Challenge completions correlate to their login via this header.
        let response = match sessionid {
            Some(sessionid) => response.header(H_SESSIONID, sessionid.to_string()),
            None => response,
        };

        let response = response.send().await.map_err(ClientError::Transport)?;

        let opid = response
            .headers()
            .get(H_OPID)
            .and_then(|hv| hv.to_str().ok())
            .unwrap_or("missing_opid")
            .to_string();
        debug!("opid -> {:?}", opid);

        match response.status() {
            reqwest::StatusCode::OK => {}
            unexpect => {
                return Err(ClientError::Http(
                    unexpect,
                    response.json().await.ok(),
                    opid,
                ))
            }
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::JsonDecode(e, opid))
    }

    async fn perform_get_request<T: DeserializeOwned>(
        &self,
        dest: &str,
        bearer_token: &str,
    ) -> Result<T, ClientError> {
        let dest = format!("{}{}", self.get_url(), dest);

        let response = self
            .client
            .get(dest.as_str())
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let opid = response
            .headers()
            .get(H_OPID)
            .and_then(|hv| hv.to_str().ok())
            .unwrap_or("missing_opid")
            .to_string();
        debug!("opid -> {:?}", opid);

        match response.status() {
            reqwest::StatusCode::OK => {}
            unexpect => {
                return Err(ClientError::Http(
                    unexpect,
                    response.json().await.ok(),
                    opid,
                ))
            }
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::JsonDecode(e, opid))
    }
}

#[async_trait]
impl DirectoryClient for PoolClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError> {
        let login_req = LoginRequest {
            pool: self.pool.clone(),
            credentials: credentials.clone(),
        };

        let r: LoginResponse = self
            .perform_auth_post_request(V1_AUTH, &login_req, None)
            .await?;
        debug!("login session id -> {:?}", r.sessionid);
        Ok(r)
    }

    async fn complete_new_password(
        &self,
        username: &str,
        sessionid: Uuid,
        new_password: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<LoginResponse, ClientError> {
        let challenge_req = ChallengeCompletionRequest {
            pool: self.pool.clone(),
            username: username.to_string(),
            new_password: new_password.to_string(),
            attributes: attributes.clone(),
        };

        self.perform_auth_post_request(V1_AUTH_CHALLENGE, &challenge_req, Some(sessionid))
            .await
    }

    async fn fetch_attributes(
        &self,
        access_token: &str,
    ) -> Result<Vec<UserAttribute>, ClientError> {
        self.perform_get_request(V1_SELF_ATTRIBUTES, access_token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{PoolClientBuilder, PoolClientConfig};
    use poolgate_proto::v1::PoolDescriptor;

    fn test_pool() -> PoolDescriptor {
        PoolDescriptor {
            pool_id: "ap-northeast-1_eSjqLfqKc".to_string(),
            client_id: "vtvg02tr21zmxvspyvawtv09b".to_string(),
            region: "ap-northeast-1".to_string(),
        }
    }

    #[test]
    fn test_build_requires_pool() {
        assert!(PoolClientBuilder::new().build().is_err());

        let incomplete = PoolDescriptor {
            client_id: String::new(),
            ..test_pool()
        };
        assert!(PoolClientBuilder::new().pool(incomplete).build().is_err());
    }

    #[test]
    fn test_address_derived_from_region() {
        let client = PoolClientBuilder::new()
            .pool(test_pool())
            .build()
            .expect("failed to build client");
        assert_eq!(client.get_url(), "https://idp.ap-northeast-1.poolgate.dev");

        let client = PoolClientBuilder::new()
            .pool(test_pool())
            .address("https://idm.example.com".to_string())
            .build()
            .expect("failed to build client");
        assert_eq!(client.get_url(), "https://idm.example.com");
    }

    #[test]
    fn test_config_options_precedence() {
        let config: PoolClientConfig =
            toml::from_str("uri = \"https://idm.example.com\"\nconnect_timeout = 5\n")
                .expect("failed to parse config");

        let builder = PoolClientBuilder::new()
            .pool(test_pool())
            .connect_timeout(30)
            .apply_config_options(config)
            .expect("failed to apply config");

        // A uri in the config file overrides the derived address, and a file
        // timeout overrides the builder's earlier value.
        let client = builder.build().expect("failed to build client");
        assert_eq!(client.get_url(), "https://idm.example.com");
        assert_eq!(client.builder.connect_timeout, Some(5));
    }

    #[test]
    fn test_missing_config_file_is_skipped() {
        let builder = PoolClientBuilder::new()
            .pool(test_pool())
            .read_options_from_optional_config("/this/path/does/not/exist.toml")
            .expect("missing config should be skipped");
        assert!(builder.address.is_none());
    }
}
