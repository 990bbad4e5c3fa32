//! Credential data model and expiry logic.
//!
//! A [`Credential`] is the unit every lifecycle operation consumes and
//! produces: the bearer access token, the optional refresh token, the
//! absolute expiry in epoch milliseconds, and the diagnostic status
//! flags surfaced on failure.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest timestamp treated as seconds-since-epoch by
/// [`normalize_epoch_ms`].
///
/// Providers and older stored data report expiry in seconds; this crate
/// works in milliseconds. Any value at or below this threshold (ten
/// digits) is multiplied by 1000. The heuristic is inherited from the
/// data already in the wild: it misreads second-scale timestamps after
/// year 2286 and cannot distinguish a genuinely tiny millisecond value
/// from a seconds value, but it keeps previously persisted credentials
/// loadable.
pub const MAX_SECONDS_TIMESTAMP: i64 = 9_999_999_999;

/// Default proactive-refresh threshold (5 minutes).
pub const DEFAULT_REFRESH_THRESHOLD_MS: i64 = 300_000;

/// Normalize an epoch timestamp to milliseconds.
///
/// Values at or below [`MAX_SECONDS_TIMESTAMP`] are treated as seconds
/// and scaled; larger values pass through unchanged. The multiply
/// saturates, so no input can panic.
pub fn normalize_epoch_ms(timestamp: i64) -> i64 {
    if timestamp <= MAX_SECONDS_TIMESTAMP {
        timestamp.saturating_mul(1000)
    } else {
        timestamp
    }
}

/// Diagnostic classification of an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessTokenStatus {
    /// The token was accepted by the provider's introspection endpoint.
    #[default]
    Valid,
    /// The provider reported the token as expired.
    Expired,
    /// The token was rejected for any other reason.
    Invalid,
}

impl AccessTokenStatus {
    /// The wire/storage spelling of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTokenStatus::Valid => "valid",
            AccessTokenStatus::Expired => "expired",
            AccessTokenStatus::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for AccessTokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic classification of a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenStatus {
    /// The refresh token worked, or has not been contradicted.
    Valid,
    /// The provider reported the refresh token as expired.
    Expired,
    /// The refresh token was rejected.
    Invalid,
    /// The credential never carried a refresh token.
    #[default]
    NotProvided,
}

impl RefreshTokenStatus {
    /// The wire/storage spelling of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTokenStatus::Valid => "valid",
            RefreshTokenStatus::Expired => "expired",
            RefreshTokenStatus::Invalid => "invalid",
            RefreshTokenStatus::NotProvided => "not_provided",
        }
    }
}

impl std::fmt::Display for RefreshTokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OAuth credential as tracked by the lifecycle manager.
///
/// Created by exchanging an authorization code or refreshing an existing
/// refresh token; mutated only by a successful refresh. `is_valid` is a
/// derived cache flag, not authoritative: recheck against `expires_at`
/// (or the introspection endpoint) before trusting a stored value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    /// Bearer token for API calls; opaque to this crate.
    pub access_token: String,

    /// Long-lived token usable to mint new access tokens. Absent for
    /// flows without offline access.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Absolute expiry of `access_token` in epoch milliseconds.
    ///
    /// Second-scale values are normalized on deserialization, see
    /// [`normalize_epoch_ms`].
    #[serde(default, deserialize_with = "de_opt_epoch_ms")]
    pub expires_at: Option<i64>,

    /// Token type reported by the provider, typically "Bearer".
    /// Passed through, not interpreted.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Derived cache flag; recomputed by lifecycle operations.
    #[serde(default)]
    pub is_valid: bool,

    /// Diagnostic classification of the access token.
    #[serde(default)]
    pub access_token_status: AccessTokenStatus,

    /// Diagnostic classification of the refresh token.
    #[serde(default)]
    pub refresh_token_status: RefreshTokenStatus,

    /// Human-readable failure detail, set on failure records.
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn de_opt_epoch_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.map(normalize_epoch_ms))
}

impl Credential {
    /// Create a credential from a token-endpoint response.
    ///
    /// `expires_in` is the provider's relative lifetime in seconds;
    /// `expires_at` becomes `now + expires_in * 1000` milliseconds. The
    /// arithmetic saturates, so a provider sending an absurd lifetime
    /// cannot panic the constructor.
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let expires_at = expires_in.map(|ei| now.saturating_add(ei.saturating_mul(1000)));
        let refresh_token_status = match refresh_token {
            Some(_) => RefreshTokenStatus::Valid,
            None => RefreshTokenStatus::NotProvided,
        };
        Self {
            access_token,
            refresh_token,
            expires_at,
            token_type: default_token_type(),
            is_valid: true,
            access_token_status: AccessTokenStatus::Valid,
            refresh_token_status,
            error_message: None,
        }
    }

    /// Create a credential with an absolute expiry timestamp.
    ///
    /// Useful when rehydrating from storage or caller-held state. The
    /// timestamp is normalized to milliseconds and `is_valid` is derived
    /// from it.
    pub fn with_expires_at(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<i64>,
    ) -> Self {
        let expires_at = expires_at.map(normalize_epoch_ms);
        let now = chrono::Utc::now().timestamp_millis();
        let is_valid = expires_at.map_or(true, |exp| exp > now);
        let refresh_token_status = match refresh_token {
            Some(_) => RefreshTokenStatus::Valid,
            None => RefreshTokenStatus::NotProvided,
        };
        Self {
            access_token,
            refresh_token,
            expires_at,
            token_type: default_token_type(),
            is_valid,
            access_token_status: AccessTokenStatus::Valid,
            refresh_token_status,
            error_message: None,
        }
    }

    /// Build a failure record for a refresh that did not produce a
    /// usable access token. The original refresh token is echoed back so
    /// callers keep whatever standing it still has.
    pub(crate) fn refresh_failure(
        refresh_token: Option<String>,
        refresh_token_status: RefreshTokenStatus,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            access_token: String::new(),
            refresh_token,
            expires_at: None,
            token_type: default_token_type(),
            is_valid: false,
            access_token_status: AccessTokenStatus::Invalid,
            refresh_token_status,
            error_message: Some(error_message.into()),
        }
    }

    /// Check whether the access token is past its expiry.
    ///
    /// Credentials without an expiry never report expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp < chrono::Utc::now().timestamp_millis(),
            None => false,
        }
    }

    /// Check whether the credential should be proactively refreshed,
    /// using the default 5-minute threshold.
    ///
    /// Advisory only: this avoids a guaranteed-failed call from
    /// long-lived clients, but [`ensure_usable_credential`] remains the
    /// authoritative gate before a real request.
    ///
    /// [`ensure_usable_credential`]: crate::manager::TokenLifecycleManager::ensure_usable_credential
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_within(DEFAULT_REFRESH_THRESHOLD_MS)
    }

    /// Check whether the credential should be proactively refreshed
    /// within the given threshold in milliseconds.
    ///
    /// True when the cache flag says the credential is not valid, when
    /// the expiry has passed, or when less than `threshold_ms` remains.
    /// Credentials without an expiry only trip the `is_valid` clause.
    #[must_use]
    pub fn needs_refresh_within(&self, threshold_ms: i64) -> bool {
        if !self.is_valid {
            return true;
        }
        match self.expires_at {
            Some(exp) => {
                let now = chrono::Utc::now().timestamp_millis();
                exp < now || (exp - now) < threshold_ms
            }
            None => false,
        }
    }

    /// Get the duration until the access token expires.
    ///
    /// Returns `Duration::ZERO` if already expired or no expiry is set.
    pub fn time_until_expiry(&self) -> Duration {
        match self.expires_at {
            Some(exp) => {
                let now = chrono::Utc::now().timestamp_millis();
                let remaining = exp.saturating_sub(now);
                if remaining > 0 {
                    Duration::from_millis(remaining as u64)
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_credential() {
        let cred = Credential::new("access".to_string(), Some("refresh".to_string()), Some(3600));
        assert_eq!(cred.access_token, "access");
        assert_eq!(cred.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(cred.token_type, "Bearer");
        assert!(cred.is_valid);
        assert_eq!(cred.access_token_status, AccessTokenStatus::Valid);
        assert_eq!(cred.refresh_token_status, RefreshTokenStatus::Valid);
        assert!(cred.error_message.is_none());
        assert!(!cred.is_expired());
    }

    #[test]
    fn test_new_without_refresh_token() {
        let cred = Credential::new("access".to_string(), None, Some(3600));
        assert_eq!(cred.refresh_token_status, RefreshTokenStatus::NotProvided);
    }

    #[test]
    fn test_new_expiry_is_milliseconds() {
        let before = chrono::Utc::now().timestamp_millis();
        let cred = Credential::new("access".to_string(), None, Some(3600));
        let after = chrono::Utc::now().timestamp_millis();

        let expires_at = cred.expires_at.unwrap();
        assert!(expires_at >= before + 3_600_000);
        assert!(expires_at <= after + 3_600_000);
    }

    #[test]
    fn test_new_saturates_huge_expiry() {
        let cred = Credential::new("access".to_string(), None, Some(i64::MAX));
        assert_eq!(cred.expires_at, Some(i64::MAX));
        assert!(cred.is_valid);
        assert!(!cred.is_expired());
        assert!(!cred.needs_refresh());
    }

    #[test]
    fn test_extreme_negative_expiry_never_panics() {
        let cred = Credential::with_expires_at("access".to_string(), None, Some(i64::MIN));
        assert!(cred.is_expired());
        assert!(!cred.is_valid);
        assert_eq!(cred.time_until_expiry(), Duration::ZERO);
    }

    #[test]
    fn test_normalize_scales_seconds() {
        assert_eq!(normalize_epoch_ms(1_700_000_000), 1_700_000_000_000);
    }

    #[test]
    fn test_normalize_keeps_milliseconds() {
        assert_eq!(normalize_epoch_ms(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn test_normalize_threshold_boundary() {
        assert_eq!(
            normalize_epoch_ms(MAX_SECONDS_TIMESTAMP),
            MAX_SECONDS_TIMESTAMP * 1000
        );
        assert_eq!(
            normalize_epoch_ms(MAX_SECONDS_TIMESTAMP + 1),
            MAX_SECONDS_TIMESTAMP + 1
        );
    }

    #[test]
    fn test_with_expires_at_normalizes_seconds() {
        let cred =
            Credential::with_expires_at("access".to_string(), None, Some(1_700_000_000));
        assert_eq!(cred.expires_at, Some(1_700_000_000_000));
    }

    #[test]
    fn test_with_expires_at_derives_validity() {
        let past = Credential::with_expires_at("access".to_string(), None, Some(1_000));
        assert!(!past.is_valid);
        assert!(past.is_expired());

        let future_ms = chrono::Utc::now().timestamp_millis() + 3_600_000;
        let fresh = Credential::with_expires_at("access".to_string(), None, Some(future_ms));
        assert!(fresh.is_valid);
        assert!(!fresh.is_expired());
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let cred = Credential::new("access".to_string(), Some("refresh".to_string()), None);
        assert!(!cred.is_expired());
        assert!(!cred.needs_refresh());
        assert_eq!(cred.time_until_expiry(), Duration::ZERO);
    }

    #[test]
    fn test_needs_refresh_when_invalid() {
        let mut cred = Credential::new("access".to_string(), None, Some(3600));
        cred.is_valid = false;
        assert!(cred.needs_refresh());
    }

    #[test]
    fn test_needs_refresh_when_expired() {
        let cred = Credential::with_expires_at("access".to_string(), None, Some(1_000));
        assert!(cred.needs_refresh());
    }

    #[test]
    fn test_needs_refresh_within_threshold() {
        let now = chrono::Utc::now().timestamp_millis();

        // Expires in 4 minutes: inside the default 5-minute threshold.
        let soon = Credential::with_expires_at("access".to_string(), None, Some(now + 240_000));
        assert!(soon.needs_refresh());

        // Expires in an hour: outside.
        let later = Credential::with_expires_at("access".to_string(), None, Some(now + 3_600_000));
        assert!(!later.needs_refresh());

        // Custom threshold tightens the window.
        assert!(!later.needs_refresh_within(60_000));
        assert!(later.needs_refresh_within(7_200_000));
    }

    #[test]
    fn test_time_until_expiry() {
        let cred = Credential::new("access".to_string(), None, Some(3600));
        let remaining = cred.time_until_expiry();
        assert!(remaining.as_secs() >= 3595);
        assert!(remaining.as_secs() <= 3600);

        let expired = Credential::with_expires_at("access".to_string(), None, Some(1_000));
        assert_eq!(expired.time_until_expiry(), Duration::ZERO);
    }

    #[test]
    fn test_refresh_failure_record() {
        let record = Credential::refresh_failure(
            Some("refresh".to_string()),
            RefreshTokenStatus::Invalid,
            "invalid_grant",
        );
        assert!(record.access_token.is_empty());
        assert_eq!(record.refresh_token.as_deref(), Some("refresh"));
        assert!(!record.is_valid);
        assert_eq!(record.access_token_status, AccessTokenStatus::Invalid);
        assert_eq!(record.refresh_token_status, RefreshTokenStatus::Invalid);
        assert_eq!(record.error_message.as_deref(), Some("invalid_grant"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let cred = Credential::new("access".to_string(), Some("refresh".to_string()), Some(3600));
        let json = serde_json::to_string(&cred).unwrap();
        let restored: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cred);
    }

    #[test]
    fn test_deserialize_normalizes_second_scale_expiry() {
        let json = r#"{"access_token":"access","expires_at":1700000000}"#;
        let cred: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.expires_at, Some(1_700_000_000_000));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"access_token":"access"}"#;
        let cred: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.token_type, "Bearer");
        assert!(cred.refresh_token.is_none());
        assert!(cred.expires_at.is_none());
        assert!(!cred.is_valid);
        assert_eq!(cred.access_token_status, AccessTokenStatus::Valid);
        assert_eq!(cred.refresh_token_status, RefreshTokenStatus::NotProvided);
    }

    #[test]
    fn test_status_serde_spelling() {
        assert_eq!(
            serde_json::to_value(RefreshTokenStatus::NotProvided).unwrap(),
            serde_json::json!("not_provided")
        );
        assert_eq!(
            serde_json::to_value(AccessTokenStatus::Expired).unwrap(),
            serde_json::json!("expired")
        );
        let status: AccessTokenStatus = serde_json::from_str("\"invalid\"").unwrap();
        assert_eq!(status, AccessTokenStatus::Invalid);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AccessTokenStatus::Valid.to_string(), "valid");
        assert_eq!(RefreshTokenStatus::NotProvided.to_string(), "not_provided");
    }

    proptest! {
        #[test]
        fn normalize_scales_iff_at_most_ten_digits(ts in 0i64..=MAX_SECONDS_TIMESTAMP) {
            prop_assert_eq!(normalize_epoch_ms(ts), ts * 1000);
        }

        #[test]
        fn normalize_passes_through_above_threshold(
            ts in (MAX_SECONDS_TIMESTAMP + 1)..i64::MAX
        ) {
            prop_assert_eq!(normalize_epoch_ms(ts), ts);
        }
    }
}
