//! Client configuration
//!
//! `ClientConfig` carries everything needed to talk to one Helki account.
//! It can be built in code or deserialized from JSON/TOML by the infra
//! loader.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{API_HOST_SUFFIX, DEFAULT_RETRY_ATTEMPTS};
use crate::errors::{HelkiError, Result};

/// Credentials and connection settings for a Helki account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host name fragment, e.g. `api-tt` for `https://api-tt.helki.com`
    pub api_name: String,
    /// Full API root overriding `api_name` (staging servers, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_root: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// Retries after the initial attempt for transient failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
}

fn default_retry_attempts() -> usize {
    DEFAULT_RETRY_ATTEMPTS
}

impl ClientConfig {
    pub fn new(
        api_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_name: api_name.into(),
            api_root: None,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Resolve the API root without a trailing slash.
    ///
    /// # Errors
    /// Returns `HelkiError::Config` if neither an override nor an API name is
    /// set, or the resulting root is not an absolute http(s) URL.
    pub fn api_root(&self) -> Result<String> {
        let root = match self.api_root.as_deref().map(str::trim) {
            Some(root) if !root.is_empty() => root.trim_end_matches('/').to_string(),
            _ => {
                let name = self.api_name.trim();
                if name.is_empty() {
                    return Err(HelkiError::Config(
                        "either api_name or api_root must be set".to_string(),
                    ));
                }
                format!("https://{name}.{API_HOST_SUFFIX}")
            }
        };

        let parsed = Url::parse(&root)
            .map_err(|e| HelkiError::Config(format!("Invalid API root '{root}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HelkiError::Config(format!(
                "API root must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(root)
    }

    /// Check that every credential field is present.
    ///
    /// # Errors
    /// Returns `HelkiError::Config` naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(HelkiError::Config(format!("{name} must not be empty")));
        }
        self.api_root().map(|_| ())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_name", &self.api_name)
            .field("api_root", &self.api_root)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}
