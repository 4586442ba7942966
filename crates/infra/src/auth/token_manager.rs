//! Token manager with on-demand re-authentication
//!
//! Manages the password-grant credential lifecycle:
//! - Authentication against the token endpoint
//! - Re-authentication when less than the safety margin remains
//! - A single in-flight authentication shared by concurrent callers
//!
//! There is no refresh-token flow; refreshing repeats the full grant.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use helki_domain::constants::{MIN_TOKEN_LIFETIME_SECS, TOKEN_PATH};
use helki_domain::{ClientConfig, HelkiError, Result};
use reqwest::{Method, StatusCode};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::types::{AuthOutcome, Credential, PasswordGrant, TokenResponse};
use crate::api::auth::AccessTokenProvider;
use crate::http::HttpClient;

#[derive(Debug, Default)]
struct TokenState {
    credential: Option<Credential>,
    /// Bumped on every successful authentication
    generation: u64,
}

/// Owner of the client's bearer credential
pub struct TokenManager {
    http: Arc<HttpClient>,
    token_url: String,
    grant: PasswordGrant,
    state: RwLock<TokenState>,
    auth_guard: Mutex<()>,
    margin_secs: i64,
}

impl TokenManager {
    /// Create a token manager for `api_root` (no trailing slash).
    pub fn new(http: Arc<HttpClient>, api_root: &str, grant: PasswordGrant) -> Self {
        Self {
            http,
            token_url: format!("{api_root}/{TOKEN_PATH}"),
            grant,
            state: RwLock::new(TokenState::default()),
            auth_guard: Mutex::new(()),
            margin_secs: MIN_TOKEN_LIFETIME_SECS,
        }
    }

    /// Create a token manager from client configuration.
    ///
    /// # Errors
    /// Returns `HelkiError::Config` if the API root cannot be resolved.
    pub fn from_config(http: Arc<HttpClient>, config: &ClientConfig) -> Result<Self> {
        let grant = PasswordGrant {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Ok(Self::new(http, &config.api_root()?, grant))
    }

    /// Return a bearer token valid for at least the safety margin,
    /// authenticating first if needed.
    ///
    /// Concurrent callers that find the credential stale wait for a single
    /// authentication and share its result.
    ///
    /// # Errors
    /// Propagates authentication failures; the previous state is kept.
    pub async fn ensure_valid(&self) -> Result<String> {
        let seen_generation = {
            let state = self.state.read().await;
            if let Some(credential) = fresh(&state, self.margin_secs) {
                return Ok(credential.access_token.clone());
            }
            state.generation
        };

        let _guard = self.auth_guard.lock().await;

        {
            let state = self.state.read().await;
            // Another caller authenticated while we waited for the guard.
            if state.generation != seen_generation {
                if let Some(credential) = state.credential.as_ref() {
                    debug!("reusing credential from concurrent authentication");
                    return Ok(credential.access_token.clone());
                }
            }
            if let Some(credential) = fresh(&state, self.margin_secs) {
                return Ok(credential.access_token.clone());
            }
        }

        debug!("credential missing or within refresh margin; authenticating");
        let credential = self.perform_authentication().await?.0;
        Ok(credential.access_token)
    }

    /// Run the password grant unconditionally and store the new credential.
    ///
    /// # Errors
    /// `HelkiError::Authentication` if the endpoint rejects the grant or
    /// returns an incomplete payload; `HelkiError::TransientTransport` if
    /// it cannot be reached, or still answers 429 or 5xx, after retries.
    pub async fn authenticate(&self) -> Result<AuthOutcome> {
        let _guard = self.auth_guard.lock().await;
        Ok(self.perform_authentication().await?.1)
    }

    /// Whether a credential is currently held, fresh or not.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.credential.is_some()
    }

    /// Seconds until the held credential expires.
    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        let state = self.state.read().await;
        state.credential.as_ref().map(|c| c.seconds_remaining(Utc::now()))
    }

    /// Number of successful authentications so far.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Forget the held credential so the next call re-authenticates.
    pub async fn invalidate(&self) {
        self.state.write().await.credential = None;
    }

    pub fn refresh_margin_secs(&self) -> i64 {
        self.margin_secs
    }

    // Caller must hold `auth_guard`.
    #[instrument(skip(self), fields(username = %self.grant.username))]
    async fn perform_authentication(&self) -> Result<(Credential, AuthOutcome)> {
        let form = [
            ("grant_type", "password"),
            ("username", self.grant.username.as_str()),
            ("password", self.grant.password.as_str()),
        ];
        let request = self
            .http
            .request(Method::POST, &self.token_url)
            .basic_auth(&self.grant.client_id, Some(&self.grant.client_secret))
            .form(&form);

        let response = self.http.send(request).await.map_err(|err| match err {
            HelkiError::TransientTransport(_) | HelkiError::Config(_) => err,
            other => HelkiError::Authentication(other.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("token endpoint returned status {status}")
            } else {
                format!("token endpoint returned status {status}: {body}")
            };
            // Rate limiting and server faults outlived the transport retries;
            // the grant itself was not judged.
            return Err(if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                HelkiError::TransientTransport(message)
            } else {
                HelkiError::Authentication(message)
            });
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| HelkiError::Authentication(format!("Invalid auth response: {e}")))?;

        let (credential, expires_in) = payload.into_credential(Utc::now())?;
        let short_lived = expires_in < self.margin_secs;
        if short_lived {
            warn!(
                expires_in,
                min_lifetime = self.margin_secs,
                "token lifetime is below the refresh margin; every request will re-authenticate"
            );
        }

        let outcome = AuthOutcome { expires_at: credential.expires_at, expires_in, short_lived };

        {
            let mut state = self.state.write().await;
            state.credential = Some(credential.clone());
            state.generation += 1;
        }

        info!(expires_in, "authenticated with token endpoint");
        Ok((credential, outcome))
    }
}

fn fresh(state: &TokenState, margin_secs: i64) -> Option<&Credential> {
    state.credential.as_ref().filter(|c| c.is_fresh(Utc::now(), margin_secs))
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn access_token(&self) -> Result<String> {
        self.ensure_valid().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn manager(server: &MockServer) -> TokenManager {
        let http = HttpClient::builder()
            .base_backoff(Duration::from_millis(1))
            .retry_attempts(2)
            .build()
            .unwrap();
        let grant = PasswordGrant {
            client_id: "client".into(),
            client_secret: "secret".into(),
            username: "user@example.com".into(),
            password: "pa ss".into(),
        };
        TokenManager::new(Arc::new(http), &server.uri(), grant)
    }

    fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
        json!({ "access_token": token, "refresh_token": "refresh", "expires_in": expires_in })
    }

    #[tokio::test]
    async fn authenticate_sends_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/client/token"))
            .and(basic_auth("client", "secret"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=user%40example.com"))
            .and(body_string_contains("password=pa+ss"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let outcome = manager.authenticate().await.unwrap();

        assert_eq!(outcome.expires_in, 3600);
        assert!(!outcome.short_lived);
        assert!(manager.is_authenticated().await);
        assert_eq!(manager.ensure_valid().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn fresh_credential_needs_no_round_trip() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        for _ in 0..5 {
            assert_eq!(manager.ensure_valid().await.unwrap(), "abc");
        }
        assert_eq!(manager.generation().await, 1);
    }

    #[tokio::test]
    async fn short_lived_credential_is_renewed_on_every_call() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 30)))
            .expect(3)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let outcome = manager.authenticate().await.unwrap();
        assert!(outcome.short_lived);

        manager.ensure_valid().await.unwrap();
        manager.ensure_valid().await.unwrap();
        assert_eq!(manager.generation().await, 3);
    }

    #[tokio::test]
    async fn incomplete_payload_keeps_previous_credential() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("first", 3600)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/client/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "second", "expires_in": 3600 })),
            )
            .mount(&server)
            .await;

        let manager = manager(&server);
        manager.authenticate().await.unwrap();

        let err = manager.authenticate().await.unwrap_err();
        assert!(matches!(err, HelkiError::Authentication(_)));
        assert_eq!(manager.ensure_valid().await.unwrap(), "first");
        assert_eq!(manager.generation().await, 1);
    }

    #[tokio::test]
    async fn rejected_grant_leaves_manager_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        match manager.ensure_valid().await {
            Err(HelkiError::Authentication(msg)) => assert!(msg.contains("401")),
            other => panic!("expected authentication error, got {:?}", other),
        }
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn rate_limited_token_endpoint_is_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let manager = manager(&server);
        match manager.ensure_valid().await {
            Err(HelkiError::TransientTransport(msg)) => assert!(msg.contains("429")),
            other => panic!("expected transient transport error, got {:?}", other),
        }
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn token_endpoint_server_error_is_transient() {
        let server = MockServer::start().await;
        // POST is not idempotent, so the 503 is not retried.
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let err = manager.authenticate().await.unwrap_err();
        assert!(matches!(err, HelkiError::TransientTransport(_)));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_authentication() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("shared", 3600))
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = Arc::new(manager(&server));
        let calls = (0..8).map(|_| {
            let manager = manager.clone();
            async move { manager.ensure_valid().await }
        });
        let tokens = futures::future::join_all(calls).await;

        assert!(tokens.iter().all(|t| t.as_deref() == Ok("shared")));
        assert_eq!(manager.generation().await, 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reauthentication() {
        let server = MockServer::start().await;
        Mock::given(path("/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let manager = manager(&server);
        manager.ensure_valid().await.unwrap();
        manager.invalidate().await;
        assert!(manager.seconds_until_expiry().await.is_none());
        manager.ensure_valid().await.unwrap();
    }
}
