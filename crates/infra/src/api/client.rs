//! Authenticated request executor
//!
//! Every call obtains a valid bearer token first, then goes through the
//! retrying [`HttpClient`]. Failures of the call itself are normalized into
//! `HelkiError::ApiRequest` carrying the request path.

use std::sync::Arc;

use helki_domain::constants::API_PREFIX;
use helki_domain::{HelkiError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::auth::AccessTokenProvider;
use crate::http::HttpClient;

/// Longest response body excerpt kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Executes bearer-authenticated JSON calls against `{api_root}/api/v2/`
pub struct ApiClient {
    http_client: Arc<HttpClient>,
    auth: Arc<dyn AccessTokenProvider>,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    ///
    /// * `api_root` - Scheme and host, e.g. `https://api-tt.helki.com`
    /// * `http_client` - Shared retrying transport
    /// * `auth` - Authentication provider
    pub fn new(
        api_root: &str,
        http_client: Arc<HttpClient>,
        auth: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let base_url = format!("{}/{API_PREFIX}", api_root.trim_end_matches('/'));
        Self { http_client, auth, base_url }
    }

    /// Absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Execute a request and return the decoded JSON body as-is.
    ///
    /// An empty success body decodes as `Value::Null`.
    ///
    /// # Errors
    ///
    /// Authentication failures propagate unchanged; any other failure is
    /// returned as `HelkiError::ApiRequest` for `path`.
    #[instrument(skip(self, body), fields(path = %path, method = %method))]
    pub async fn request(&self, path: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        let token = self.auth.access_token().await?;
        let url = self.url_for(path);

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                HelkiError::api_request(path, format!("Failed to serialize body: {e}"), None)
            })?;
            request = request.body(bytes);
        }

        debug!(url = %url, "API request");

        let response = self
            .http_client
            .send(request)
            .await
            .map_err(|e| HelkiError::api_request(path, transport_message(e), None))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            HelkiError::api_request(
                path,
                format!("Failed to read response: {e}"),
                Some(status.as_u16()),
            )
        })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            let message = if excerpt.trim().is_empty() {
                format!("server returned status {status}")
            } else {
                format!("server returned status {status}: {}", excerpt.trim())
            };
            return Err(HelkiError::api_request(path, message, Some(status.as_u16())));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(%status, "API request returned no content");
            return Ok(Value::Null);
        }

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            HelkiError::api_request(
                path,
                format!("Failed to parse response: {e}"),
                Some(status.as_u16()),
            )
        })?;

        debug!(%status, "API request successful");
        Ok(value)
    }

    /// GET `path` and deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; shape mismatches are `ApiRequest` errors.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.request(path, Method::GET, None).await?;
        decode(path, value)
    }

    /// POST `body` to `path` and deserialize the reply into `R`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| {
            HelkiError::api_request(path, format!("Failed to serialize body: {e}"), None)
        })?;
        let value = self.request(path, Method::POST, Some(&body)).await?;
        decode(path, value)
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| HelkiError::api_request(path, format!("Unexpected response shape: {e}"), None))
}

fn transport_message(err: HelkiError) -> String {
    match err {
        HelkiError::TransientTransport(message)
        | HelkiError::Authentication(message)
        | HelkiError::Config(message)
        | HelkiError::InvalidInput(message)
        | HelkiError::Internal(message) => message,
        HelkiError::ApiRequest { message, .. } => message,
    }
}
