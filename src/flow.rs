//! Authorization-flow request types and callback validation.
//!
//! Everything the browser-facing half of the authorization-code flow
//! needs: the knobs on the authorization URL, CSRF state generation,
//! and validation of the parameters the provider sends back to the
//! redirect URI.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Whether the provider should issue a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Access token only; no refresh token.
    Online,
    /// Request a refresh token for offline use.
    #[default]
    Offline,
}

impl AccessType {
    /// The wire spelling used in the authorization URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Online => "online",
            AccessType::Offline => "offline",
        }
    }
}

/// How aggressively the provider re-prompts the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// Never re-prompt; fails if consent is needed.
    None,
    /// Always show the consent screen. Google only returns a refresh
    /// token on consented grants, so this is the default.
    #[default]
    Consent,
    /// Force the account chooser.
    SelectAccount,
}

impl Prompt {
    /// The wire spelling used in the authorization URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::None => "none",
            Prompt::Consent => "consent",
            Prompt::SelectAccount => "select_account",
        }
    }
}

/// Parameters for one authorization URL.
///
/// Scopes listed here take precedence over the client's default scopes;
/// leave empty to fall back to the client's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Scopes to request, joined with spaces in the URL.
    pub scopes: Vec<String>,
    /// Opaque CSRF token echoed back in the callback. Omitted from the
    /// URL when `None`; see [`generate_state`].
    pub state: Option<String>,
    /// Offline/online access selector.
    pub access_type: AccessType,
    /// Consent prompting behavior.
    pub prompt: Prompt,
}

impl AuthorizationRequest {
    /// Create a request for the given scopes with default access type
    /// and prompt.
    pub fn new(scopes: Vec<String>) -> Self {
        Self {
            scopes,
            state: None,
            access_type: AccessType::default(),
            prompt: Prompt::default(),
        }
    }

    /// Attach a CSRF state token.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl Default for AuthorizationRequest {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Generate a random CSRF state token.
///
/// 128 bits of randomness, URL-safe base64 without padding (22 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    /// Authorization code, present on success.
    pub code: Option<String>,
    /// Echoed CSRF state token.
    pub state: Option<String>,
    /// Provider error code, e.g. "access_denied".
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable error detail.
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Validate callback parameters and extract the code and state.
///
/// Checked in order: a provider-reported error wins over everything,
/// then a missing code, then a missing state.
pub fn validate_callback_params(params: &CallbackParams) -> Result<(String, String)> {
    if let Some(error) = &params.error {
        warn!(
            error = %error,
            description = ?params.error_description,
            "Authorization callback returned an error"
        );
        let message = match &params.error_description {
            Some(desc) => format!("{error}: {desc}"),
            None => error.clone(),
        };
        return Err(Error::TokenExchange(message));
    }

    let code = params
        .code
        .as_ref()
        .ok_or_else(|| Error::TokenExchange("Missing authorization code in callback".to_string()))?;

    let state = params.state.as_ref().ok_or(Error::CsrfMismatch)?;

    Ok((code.clone(), state.clone()))
}
