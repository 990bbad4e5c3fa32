//! # token-steward
//!
//! Provider-agnostic OAuth 2.0 token lifecycle management.
//!
//! This library owns the decision logic for whether a bearer credential
//! is usable, and if not, how to make it usable: validate against the
//! provider, refresh exactly once, or report a structured failure. It
//! also provides the primitives that bootstrap a credential from an
//! authorization-code flow.
//!
//! One implementation serves any provider speaking the common OAuth 2.0
//! dialect (Google, LinkedIn, and the like); endpoints are plain
//! configuration, never code.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use token_steward::{
//!     generate_state, AuthorizationRequest, ClientCredentials, ProviderEndpoints,
//!     TokenLifecycleManager,
//! };
//!
//! # async fn example() -> token_steward::Result<()> {
//! let manager = TokenLifecycleManager::new(ProviderEndpoints::google());
//! let client = ClientCredentials::new("client-id", "client-secret", "https://app.example.com/cb")
//!     .with_scopes(vec!["openid".to_string(), "email".to_string()]);
//!
//! // Send the user to the provider.
//! let state = generate_state();
//! let request = AuthorizationRequest::new(client.scopes.clone()).with_state(state.clone());
//! let url = manager.build_authorization_url(&request, &client)?;
//! println!("Open this URL to authenticate: {}", url);
//!
//! // The provider redirects back with ?code=...&state=...
//! // let credential = manager.complete_authorization(&params, &state, &client).await?;
//!
//! // Before every API call, make sure the credential is still good:
//! // let usable = manager.ensure_usable_credential(&credential, &client, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Authorization-code flow**: deterministic URL construction, CSRF
//!   state generation and callback validation, code exchange
//! - **Rotation-tolerant refresh**: prefers the provider's returned
//!   refresh token, keeps the original when the provider omits one
//! - **Authoritative validity checks**: provider introspection with an
//!   exact expired/invalid classification, plus a local proactive check
//! - **Structured failure records**: refresh and ensure report status
//!   fields to branch on instead of strings to match
//! - **Pluggable persistence**: file, memory, or system keyring
//!   credential stores, all behind one trait
//!
//! ## Feature Flags
//!
//! - `system-keyring`: system keyring credential storage (macOS
//!   Keychain, Linux Secret Service, Windows Credential Manager)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod credential;
pub mod error;
pub mod flow;
pub mod manager;
mod models;
pub mod storage;

pub use config::{ClientCredentials, ProviderEndpoints};
pub use error::{Error, Result};

// Re-export the credential model at crate root
pub use credential::{
    normalize_epoch_ms, AccessTokenStatus, Credential, RefreshTokenStatus,
    DEFAULT_REFRESH_THRESHOLD_MS, MAX_SECONDS_TIMESTAMP,
};

// Re-export flow types at crate root
pub use flow::{
    generate_state, validate_callback_params, AccessType, AuthorizationRequest, CallbackParams,
    Prompt,
};

pub use manager::{TokenLifecycleManager, TokenValidity};

// Re-export storage types at crate root
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

#[cfg(feature = "system-keyring")]
pub use storage::KeyringCredentialStore;
