//! The token lifecycle manager.
//!
//! [`TokenLifecycleManager`] decides whether a bearer credential is
//! usable and, if not, how to make it usable: exactly one refresh
//! attempt, never a retry loop. It also provides the two one-shot
//! primitives that bootstrap a credential from an authorization-code
//! flow: building the authorization URL and exchanging the code.
//!
//! The manager is stateless. Every operation takes a credential
//! snapshot and returns a new one; persistence and serialization of
//! concurrent refreshes against the same stored credential belong to
//! the caller (see [`crate::storage`] for ready-made backends).

use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientCredentials, ProviderEndpoints};
use crate::credential::{AccessTokenStatus, Credential, RefreshTokenStatus};
use crate::error::{Error, Result};
use crate::flow::{validate_callback_params, AuthorizationRequest, CallbackParams};
use crate::models::{TokenErrorResponse, TokenInfoResponse, TokenResponse};

/// Result of a token introspection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidity {
    /// Whether the provider accepted the token.
    pub valid: bool,
    /// Classification of the outcome.
    pub status: AccessTokenStatus,
    /// Provider or transport detail when not valid.
    pub error_message: Option<String>,
}

impl TokenValidity {
    fn valid() -> Self {
        Self {
            valid: true,
            status: AccessTokenStatus::Valid,
            error_message: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            status: AccessTokenStatus::Invalid,
            error_message: Some(message.into()),
        }
    }

    fn expired(message: Option<String>) -> Self {
        Self {
            valid: false,
            status: AccessTokenStatus::Expired,
            error_message: message,
        }
    }
}

/// Stateless OAuth 2.0 token lifecycle manager for one provider.
///
/// Construction is cheap and instances are independent: no shared
/// state, no process-wide caching. Clone freely; the underlying HTTP
/// client is reference-counted.
#[derive(Debug, Clone)]
pub struct TokenLifecycleManager {
    endpoints: ProviderEndpoints,
    http_client: reqwest::Client,
}

impl TokenLifecycleManager {
    /// Create a manager for the given provider endpoints.
    ///
    /// The built-in HTTP client follows no redirects and sets no
    /// request timeout; callers wanting timeouts, proxies or retries
    /// should wrap their own client via [`with_client`].
    ///
    /// [`with_client`]: TokenLifecycleManager::with_client
    pub fn new(endpoints: ProviderEndpoints) -> Self {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            endpoints,
            http_client,
        }
    }

    /// Create a manager using a caller-supplied HTTP client.
    pub fn with_client(endpoints: ProviderEndpoints, http_client: reqwest::Client) -> Self {
        Self {
            endpoints,
            http_client,
        }
    }

    /// The provider endpoints this manager talks to.
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    /// The HTTP client used for provider calls.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Build the provider authorization URL for a browser redirect.
    ///
    /// Pure construction, no network. Query parameters appear in a
    /// deterministic order: `client_id`, `redirect_uri`,
    /// `response_type=code`, `scope` (space-joined), `access_type`,
    /// `prompt`, then `state` if the request carries one. Scopes on the
    /// request win over the client's default scopes.
    ///
    /// # Example
    ///
    /// ```
    /// use token_steward::{
    ///     AuthorizationRequest, ClientCredentials, ProviderEndpoints, TokenLifecycleManager,
    /// };
    ///
    /// let manager = TokenLifecycleManager::new(ProviderEndpoints::google());
    /// let client = ClientCredentials::new("my-client", "secret", "https://app.example.com/cb")
    ///     .with_scopes(vec!["openid".to_string()]);
    /// let url = manager.build_authorization_url(&AuthorizationRequest::default(), &client)?;
    /// assert!(url.as_str().starts_with("https://accounts.google.com"));
    /// # Ok::<(), token_steward::Error>(())
    /// ```
    pub fn build_authorization_url(
        &self,
        request: &AuthorizationRequest,
        client: &ClientCredentials,
    ) -> Result<Url> {
        if client.client_id.is_empty() {
            return Err(Error::InvalidArgument("client_id is empty".to_string()));
        }
        if client.redirect_uri.is_empty() {
            return Err(Error::InvalidArgument("redirect_uri is empty".to_string()));
        }

        let scopes = if request.scopes.is_empty() {
            &client.scopes
        } else {
            &request.scopes
        };
        let scope = scopes.join(" ");

        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type={}&prompt={}",
            self.endpoints.auth_url,
            urlencoding::encode(&client.client_id),
            urlencoding::encode(&client.redirect_uri),
            urlencoding::encode(&scope),
            request.access_type.as_str(),
            request.prompt.as_str(),
        );
        if let Some(state) = &request.state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }

        Url::parse(&url)
            .map_err(|e| Error::InvalidArgument(format!("Invalid authorization URL: {e}")))
    }

    /// Exchange an authorization code for a credential.
    ///
    /// Single POST with `grant_type=authorization_code`. The response
    /// body must carry `access_token` and `expires_in`; a 2xx body
    /// missing either fails with [`Error::MalformedResponse`] instead
    /// of being silently accepted. Side-effect free with respect to any
    /// cache: the caller owns persistence.
    ///
    /// Authorization codes are single-use. A rejection here means the
    /// flow must be restarted, not retried.
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        client: &ClientCredentials,
    ) -> Result<Credential> {
        debug!("Exchanging authorization code for tokens");

        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
                warn!(
                    error = ?error.error,
                    description = ?error.error_description,
                    "Token exchange rejected by provider"
                );
                if let Some(message) = error.message() {
                    return Err(Error::TokenExchange(message));
                }
            }
            return Err(Error::TokenExchange(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| Error::MalformedResponse(format!("Failed to parse token response: {e}")))?;
        debug!(scope = ?token.scope, "Token exchange successful");
        Ok(Self::credential_from_response(token, None))
    }

    /// Ask the provider whether an access token is currently valid.
    ///
    /// Never fails past its own boundary: transport errors are mapped
    /// to an invalid result carrying the error text. A 400 whose error
    /// description mentions "expired" (case-insensitive) classifies as
    /// expired; any other rejection as invalid; a 2xx body that does
    /// not match the token-info schema as invalid with the message
    /// "Invalid token info format".
    pub async fn check_access_token_validity(&self, access_token: &str) -> TokenValidity {
        debug!("Checking access token validity");

        let response = match self
            .http_client
            .get(&self.endpoints.tokeninfo_url)
            .query(&[("access_token", access_token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Token introspection request failed");
                return TokenValidity::invalid(err.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "Failed to read introspection response");
                return TokenValidity::invalid(err.to_string());
            }
        };

        if !status.is_success() {
            let error = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            let description = error
                .as_ref()
                .and_then(|e| e.error_description.clone());
            if status == reqwest::StatusCode::BAD_REQUEST
                && description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains("expired"))
            {
                debug!("Provider reports access token expired");
                return TokenValidity::expired(description);
            }
            let message = error
                .and_then(|e| e.message())
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body));
            warn!(status = status.as_u16(), "Access token rejected by introspection");
            return TokenValidity::invalid(message);
        }

        match serde_json::from_str::<TokenInfoResponse>(&body) {
            Ok(info) => {
                debug!(expires_in = info.expires_in, scope = ?info.scope, "Access token is valid");
                TokenValidity::valid()
            }
            Err(err) => {
                warn!(error = %err, "Introspection returned an unrecognized body");
                TokenValidity::invalid("Invalid token info format")
            }
        }
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Never fails past its own boundary: all paths return a credential
    /// record so callers can branch without error handling.
    ///
    /// - Transport errors and provider rejections yield a failure
    ///   record: empty access token, the original refresh token echoed
    ///   back, both statuses invalid and the provider detail in
    ///   `error_message`.
    /// - A 2xx body that fails schema validation yields a failure
    ///   record with `refresh_token_status` still valid, since the
    ///   grant itself was accepted.
    /// - Success yields a fresh credential. Rotation-tolerant: the
    ///   provider's returned refresh token is preferred, falling back
    ///   to the one that was sent when the provider omits it.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
        scopes: Option<&[String]>,
    ) -> Credential {
        debug!("Refreshing access token");

        match self.request_refresh(refresh_token, client, scopes).await {
            Ok(token) => {
                debug!(scope = ?token.scope, "Token refresh successful");
                Self::credential_from_response(token, Some(refresh_token))
            }
            Err(err) => {
                let refresh_token_status = match &err {
                    Error::MalformedResponse(_) => RefreshTokenStatus::Valid,
                    _ => RefreshTokenStatus::Invalid,
                };
                warn!(error = %err, "Token refresh failed");
                Credential::refresh_failure(
                    Some(refresh_token.to_string()),
                    refresh_token_status,
                    err.to_string(),
                )
            }
        }
    }

    async fn request_refresh(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
        scopes: Option<&[String]>,
    ) -> Result<TokenResponse> {
        let scope = scopes.filter(|s| !s.is_empty()).map(|s| s.join(" "));
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];
        if let Some(scope) = scope.as_deref() {
            params.push(("scope", scope));
        }

        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
                warn!(
                    error = ?error.error,
                    description = ?error.error_description,
                    "Token refresh rejected by provider"
                );
                if error.is_invalid_grant() {
                    return Err(Error::RefreshRejected(
                        error.message().unwrap_or_else(|| "invalid_grant".to_string()),
                    ));
                }
                if let Some(message) = error.message() {
                    return Err(Error::TokenExchange(message));
                }
            }
            return Err(Error::TokenExchange(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| Error::MalformedResponse(format!("Failed to parse token response: {e}")))
    }

    /// Make sure a credential is usable, refreshing it if necessary.
    ///
    /// The composite policy every API-calling collaborator should run
    /// before issuing a request:
    ///
    /// 1. An empty access token fails immediately with
    ///    [`Error::MissingCredential`], no network call.
    /// 2. The token is checked against the introspection endpoint.
    /// 3. A valid token returns the credential unchanged, annotated
    ///    `is_valid = true`.
    /// 4. Otherwise client id and secret must both be present
    ///    ([`Error::MissingClientCredentials`]) and the credential must
    ///    carry a refresh token ([`Error::MissingRefreshToken`]).
    /// 5. One refresh attempt is made. Its result is returned verbatim,
    ///    except that a failed refresh keeps the access token status
    ///    determined in step 2 and concatenates both failure details in
    ///    `error_message`, so "expired and refresh failed" stays
    ///    distinguishable from other combinations.
    ///
    /// Worst case is exactly two network round trips; zero when the
    /// credential is empty. Refresh failures come back as `Ok` failure
    /// records (check `is_valid`), matching [`refresh_access_token`];
    /// the `Err` variants here are all local precondition failures that
    /// mean the caller must re-run the authorization flow.
    ///
    /// [`refresh_access_token`]: TokenLifecycleManager::refresh_access_token
    pub async fn ensure_usable_credential(
        &self,
        credential: &Credential,
        client: &ClientCredentials,
        scopes: Option<&[String]>,
    ) -> Result<Credential> {
        if credential.access_token.is_empty() {
            return Err(Error::MissingCredential);
        }

        let validity = self.check_access_token_validity(&credential.access_token).await;
        if validity.valid {
            let mut usable = credential.clone();
            usable.is_valid = true;
            usable.access_token_status = AccessTokenStatus::Valid;
            return Ok(usable);
        }

        if client.client_id.is_empty() || client.client_secret.is_empty() {
            return Err(Error::MissingClientCredentials);
        }
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingRefreshToken)?;

        let mut refreshed = self.refresh_access_token(refresh_token, client, scopes).await;
        if !refreshed.is_valid {
            refreshed.access_token_status = validity.status;
            refreshed.error_message = match (validity.error_message, refreshed.error_message) {
                (Some(check), Some(refresh)) => Some(format!("{check}; {refresh}")),
                (Some(check), None) => Some(check),
                (None, refresh) => refresh,
            };
        }
        Ok(refreshed)
    }

    /// Validate an authorization callback and exchange its code.
    ///
    /// The provider's echoed `state` must match `expected_state`
    /// byte-for-byte before any network call is made; a mismatch is a
    /// fatal [`Error::CsrfMismatch`], never retried.
    pub async fn complete_authorization(
        &self,
        params: &CallbackParams,
        expected_state: &str,
        client: &ClientCredentials,
    ) -> Result<Credential> {
        let (code, state) = validate_callback_params(params)?;
        if state != expected_state {
            warn!("State parameter mismatch in authorization callback");
            return Err(Error::CsrfMismatch);
        }
        debug!("Authorization callback validated");
        self.exchange_code_for_tokens(&code, client).await
    }

    fn credential_from_response(token: TokenResponse, original_refresh: Option<&str>) -> Credential {
        let refresh_token = token
            .refresh_token
            .or_else(|| original_refresh.map(str::to_string));
        let mut credential = Credential::new(token.access_token, refresh_token, Some(token.expires_in));
        if let Some(token_type) = token.token_type {
            credential.token_type = token_type;
        }
        credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{AccessType, Prompt};

    fn test_endpoints() -> ProviderEndpoints {
        ProviderEndpoints::new(
            "https://provider.example/auth",
            "https://provider.example/token",
            "https://provider.example/tokeninfo",
        )
    }

    fn test_client() -> ClientCredentials {
        ClientCredentials::new(
            "my-client",
            "my-secret",
            "https://app.example.com/callback",
        )
    }

    #[test]
    fn test_authorization_url_deterministic_order() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let request = AuthorizationRequest::new(vec!["openid".to_string(), "email".to_string()])
            .with_state("abc123");

        let url = manager
            .build_authorization_url(&request, &test_client())
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://provider.example/auth?client_id=my-client\
             &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback\
             &response_type=code&scope=openid%20email\
             &access_type=offline&prompt=consent&state=abc123"
        );
    }

    #[test]
    fn test_authorization_url_without_state() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let request = AuthorizationRequest::new(vec!["openid".to_string()]);

        let url = manager
            .build_authorization_url(&request, &test_client())
            .unwrap();

        assert!(!url.as_str().contains("state="));
        assert!(url.as_str().ends_with("&prompt=consent"));
    }

    #[test]
    fn test_authorization_url_access_type_and_prompt() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let mut request = AuthorizationRequest::new(vec!["openid".to_string()]);
        request.access_type = AccessType::Online;
        request.prompt = Prompt::SelectAccount;

        let url = manager
            .build_authorization_url(&request, &test_client())
            .unwrap();

        assert!(url.as_str().contains("&access_type=online"));
        assert!(url.as_str().contains("&prompt=select_account"));
    }

    #[test]
    fn test_authorization_url_falls_back_to_client_scopes() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let client = test_client().with_scopes(vec!["profile".to_string()]);

        let url = manager
            .build_authorization_url(&AuthorizationRequest::default(), &client)
            .unwrap();

        assert!(url.as_str().contains("&scope=profile&"));
    }

    #[test]
    fn test_authorization_url_request_scopes_win() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let client = test_client().with_scopes(vec!["profile".to_string()]);
        let request = AuthorizationRequest::new(vec!["openid".to_string()]);

        let url = manager.build_authorization_url(&request, &client).unwrap();

        assert!(url.as_str().contains("&scope=openid&"));
        assert!(!url.as_str().contains("profile"));
    }

    #[test]
    fn test_authorization_url_empty_scopes() {
        let manager = TokenLifecycleManager::new(test_endpoints());

        let url = manager
            .build_authorization_url(&AuthorizationRequest::default(), &test_client())
            .unwrap();

        assert!(url.as_str().contains("&scope=&access_type="));
    }

    #[test]
    fn test_authorization_url_rejects_empty_client_id() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let mut client = test_client();
        client.client_id = String::new();

        let err = manager
            .build_authorization_url(&AuthorizationRequest::default(), &client)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_authorization_url_rejects_empty_redirect_uri() {
        let manager = TokenLifecycleManager::new(test_endpoints());
        let mut client = test_client();
        client.redirect_uri = String::new();

        let err = manager
            .build_authorization_url(&AuthorizationRequest::default(), &client)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("redirect_uri"));
    }

    #[test]
    fn test_credential_from_response_prefers_rotated_token() {
        let token = TokenResponse {
            access_token: "tok2".to_string(),
            expires_in: 3600,
            refresh_token: Some("ref2".to_string()),
            token_type: None,
            scope: None,
        };
        let credential = TokenLifecycleManager::credential_from_response(token, Some("ref1"));
        assert_eq!(credential.refresh_token.as_deref(), Some("ref2"));
        assert_eq!(credential.token_type, "Bearer");
    }

    #[test]
    fn test_credential_from_response_falls_back_to_sent_token() {
        let token = TokenResponse {
            access_token: "tok2".to_string(),
            expires_in: 3600,
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            scope: None,
        };
        let credential = TokenLifecycleManager::credential_from_response(token, Some("ref1"));
        assert_eq!(credential.refresh_token.as_deref(), Some("ref1"));
        assert_eq!(credential.token_type, "bearer");
    }

    #[test]
    fn test_token_validity_constructors() {
        let valid = TokenValidity::valid();
        assert!(valid.valid);
        assert_eq!(valid.status, AccessTokenStatus::Valid);
        assert!(valid.error_message.is_none());

        let invalid = TokenValidity::invalid("nope");
        assert!(!invalid.valid);
        assert_eq!(invalid.status, AccessTokenStatus::Invalid);
        assert_eq!(invalid.error_message.as_deref(), Some("nope"));

        let expired = TokenValidity::expired(Some("Token expired".to_string()));
        assert_eq!(expired.status, AccessTokenStatus::Expired);
    }
}
