//! Provider endpoint and client credential configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provider endpoints
// ---------------------------------------------------------------------------

/// The three provider URLs every lifecycle operation is built from.
///
/// Any OAuth 2.0 authorization-code provider can be described by these,
/// no provider-specific code paths exist downstream. Presets are
/// provided for the providers this crate grew up against; anything else
/// goes through [`ProviderEndpoints::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    /// Authorization endpoint the user's browser is sent to.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh grants.
    pub token_url: String,
    /// Introspection endpoint queried as `{tokeninfo_url}?access_token=...`.
    pub tokeninfo_url: String,
}

impl ProviderEndpoints {
    /// Describe an arbitrary provider by its three endpoint URLs.
    pub fn new(
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        tokeninfo_url: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            tokeninfo_url: tokeninfo_url.into(),
        }
    }

    /// Google OAuth 2.0 endpoints.
    pub fn google() -> Self {
        Self::new(
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
            "https://www.googleapis.com/oauth2/v1/tokeninfo",
        )
    }

    /// LinkedIn OAuth 2.0 endpoints.
    pub fn linkedin() -> Self {
        Self::new(
            "https://www.linkedin.com/oauth/v2/authorization",
            "https://www.linkedin.com/oauth/v2/accessToken",
            "https://www.linkedin.com/oauth/v2/introspectToken",
        )
    }
}

// ---------------------------------------------------------------------------
// Client credentials
// ---------------------------------------------------------------------------

/// OAuth client registration: the application's identity at a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Client identifier issued by the provider.
    pub client_id: String,
    /// Client secret issued by the provider.
    pub client_secret: String,
    /// Redirect URI registered with the provider, echoed verbatim in
    /// authorization and exchange requests.
    pub redirect_uri: String,
    /// Default scopes requested when an authorization request does not
    /// carry its own.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ClientCredentials {
    /// Create client credentials without default scopes.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
        }
    }

    /// Set the default scopes requested during authorization.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}
