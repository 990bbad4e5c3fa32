//! Wire formats for the provider's token and introspection endpoints.
//!
//! External JSON is never trusted: these structs are the only shapes a
//! 2xx body may take, and anything that fails to deserialize is
//! surfaced as a malformed response instead of being partially
//! accepted.

use serde::Deserialize;

/// Successful token endpoint response, shared by the code-exchange and
/// refresh grants. `access_token` and `expires_in` are mandatory; a 2xx
/// body missing either is rejected.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body the token endpoint returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    /// Best human-readable detail: the description when present,
    /// otherwise the bare error code.
    pub(crate) fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.error.clone())
    }

    /// Whether the provider rejected the grant itself. Some providers
    /// put `invalid_grant` in the description rather than the error
    /// code, so both fields are consulted.
    pub(crate) fn is_invalid_grant(&self) -> bool {
        self.error.as_deref() == Some("invalid_grant")
            || self
                .error_description
                .as_deref()
                .is_some_and(|d| d.contains("invalid_grant"))
    }
}

/// Successful introspection response. Only `expires_in` is required;
/// a 2xx body without it does not count as a valid token.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenInfoResponse {
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let json = r#"{
            "access_token": "tok1",
            "expires_in": 3600,
            "refresh_token": "ref1",
            "token_type": "Bearer",
            "scope": "openid email"
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "tok1");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.refresh_token.as_deref(), Some("ref1"));
        assert_eq!(token.scope.as_deref(), Some("openid email"));
    }

    #[test]
    fn test_parse_token_response_optional_fields_absent() {
        let json = r#"{"access_token": "tok1", "expires_in": 3600}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(token.refresh_token.is_none());
        assert!(token.token_type.is_none());
        assert!(token.scope.is_none());
    }

    #[test]
    fn test_token_response_requires_access_token() {
        let json = r#"{"expires_in": 3600}"#;
        assert!(serde_json::from_str::<TokenResponse>(json).is_err());
    }

    #[test]
    fn test_token_response_requires_expires_in() {
        let json = r#"{"access_token": "tok1"}"#;
        assert!(serde_json::from_str::<TokenResponse>(json).is_err());
    }

    #[test]
    fn test_token_response_rejects_wrong_types() {
        let json = r#"{"access_token": "tok1", "expires_in": "3600"}"#;
        assert!(serde_json::from_str::<TokenResponse>(json).is_err());
    }

    #[test]
    fn test_error_response_message_prefers_description() {
        let error: TokenErrorResponse = serde_json::from_str(
            r#"{"error": "invalid_request", "error_description": "Missing code"}"#,
        )
        .unwrap();
        assert_eq!(error.message().as_deref(), Some("Missing code"));
    }

    #[test]
    fn test_error_response_message_falls_back_to_code() {
        let error: TokenErrorResponse =
            serde_json::from_str(r#"{"error": "invalid_request"}"#).unwrap();
        assert_eq!(error.message().as_deref(), Some("invalid_request"));
    }

    #[test]
    fn test_invalid_grant_in_error_code() {
        let error: TokenErrorResponse =
            serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        assert!(error.is_invalid_grant());
    }

    #[test]
    fn test_invalid_grant_in_description() {
        let error: TokenErrorResponse =
            serde_json::from_str(r#"{"error_description": "invalid_grant"}"#).unwrap();
        assert!(error.is_invalid_grant());
    }

    #[test]
    fn test_other_errors_are_not_invalid_grant() {
        let error: TokenErrorResponse =
            serde_json::from_str(r#"{"error": "invalid_client"}"#).unwrap();
        assert!(!error.is_invalid_grant());
    }

    #[test]
    fn test_parse_token_info() {
        let json = r#"{"expires_in": 1200, "scope": "openid"}"#;
        let info: TokenInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(info.expires_in, 1200);
        assert_eq!(info.scope.as_deref(), Some("openid"));
    }

    #[test]
    fn test_token_info_requires_expires_in() {
        let json = r#"{"scope": "openid"}"#;
        assert!(serde_json::from_str::<TokenInfoResponse>(json).is_err());
    }
}
