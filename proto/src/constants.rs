//! Shared URI and header constants for the directory protocol.

pub const APPLICATION_JSON: &str = "application/json";

pub const V1_AUTH: &str = "/v1/auth";
pub const V1_AUTH_CHALLENGE: &str = "/v1/auth/challenge";
pub const V1_SELF_ATTRIBUTES: &str = "/v1/self/attributes";

/// Response header carrying the directory's operation id, propagated into
/// client errors and logs for cross-referencing server events.
pub const H_OPID: &str = "X-POOLGATE-OPID";

/// Request header correlating a challenge completion with the login that
/// raised the challenge.
pub const H_SESSIONID: &str = "X-POOLGATE-AUTH-SESSION-ID";

/// The conventional origin for a pool deployment in a region. There is no
/// fallback region - callers must always supply one explicitly.
pub fn default_address(region: &str) -> String {
    format!("https://idp.{}.poolgate.dev", region)
}

#[cfg(test)]
mod tests {
    use super::default_address;

    #[test]
    fn test_default_address() {
        assert_eq!(
            default_address("ap-northeast-1"),
            "https://idp.ap-northeast-1.poolgate.dev"
        );
    }
}
