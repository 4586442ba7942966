//! Password-grant token types
//!
//! Raw token endpoint payloads are validated into a [`Credential`] before
//! anything is stored; a response missing any required field never yields a
//! credential.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use helki_domain::{HelkiError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Bearer credential held in memory by the token manager
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Seconds left before expiry at `now`; negative once expired.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Whether the credential outlives `now` by at least `margin_secs`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        now + Duration::seconds(margin_secs) <= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response as received; every field is checked before use
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds; some deployments send it as a string
    #[serde(default)]
    pub expires_in: Option<Value>,
}

impl TokenResponse {
    /// Validate the payload and compute the expiry relative to `now`.
    ///
    /// Returns the credential and the declared lifetime in seconds.
    ///
    /// # Errors
    /// `HelkiError::Authentication` if the access token, refresh token or a
    /// positive lifetime is missing.
    pub fn into_credential(self, now: DateTime<Utc>) -> Result<(Credential, i64)> {
        let access_token = non_empty(self.access_token)
            .ok_or_else(|| invalid("missing access_token"))?;
        // Not used for refreshing, but its absence marks a broken grant.
        non_empty(self.refresh_token).ok_or_else(|| invalid("missing refresh_token"))?;
        let expires_in = self
            .expires_in
            .as_ref()
            .and_then(lifetime_secs)
            .ok_or_else(|| invalid("missing or invalid expires_in"))?;

        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| invalid("expires_in out of range"))?;

        Ok((Credential { access_token, expires_at }, expires_in))
    }
}

/// Result of a successful authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    pub expires_at: DateTime<Utc>,
    /// Lifetime declared by the server, in seconds
    pub expires_in: i64,
    /// The lifetime is below the refresh margin, so every request will
    /// re-authenticate
    pub short_lived: bool,
}

/// Resource-owner and client credentials for the password grant
#[derive(Clone)]
pub struct PasswordGrant {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn lifetime_secs(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (secs > 0).then_some(secs)
}

fn invalid(reason: &str) -> HelkiError {
    HelkiError::Authentication(format!("Invalid auth response: {reason}"))
}
