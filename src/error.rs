//! Error types for token lifecycle operations.

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during token lifecycle operations.
///
/// Network-touching operations that are documented as never failing
/// ([`check_access_token_validity`] and [`refresh_access_token`]) convert
/// these into structured results at their own boundary; everything else
/// propagates them through [`Result`].
///
/// [`check_access_token_validity`]: crate::manager::TokenLifecycleManager::check_access_token_validity
/// [`refresh_access_token`]: crate::manager::TokenLifecycleManager::refresh_access_token
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input to a pure/local operation. Caller-correctable,
    /// never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The credential carries no access token; nothing to validate or
    /// refresh. The caller must run the full authorization flow.
    #[error("Credential has no access token")]
    MissingCredential,

    /// A refresh was required but the client id or secret is missing.
    #[error("Client id and secret are required to refresh an access token")]
    MissingClientCredentials,

    /// A refresh was required but the credential has no refresh token.
    #[error("Credential has no refresh token")]
    MissingRefreshToken,

    /// The provider rejected a token request (used/expired authorization
    /// code, mismatched redirect URI, malformed request). Authorization
    /// codes are single-use; the caller must restart the flow.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The provider returned 2xx but a body that fails schema validation.
    /// Usually indicates an API contract change, not a user-fixable error.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// The refresh token itself was rejected (invalid, expired, or
    /// revoked). Fatal for the session; the user must re-authenticate.
    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),

    /// Network-level failure (DNS, connection reset, timeout). Callers
    /// may retry at their discretion; this crate never retries.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The `state` parameter returned by the provider does not match the
    /// value sent. Always fatal, never retried.
    #[error("State mismatch in authorization callback")]
    CsrfMismatch,

    /// Credential storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}
