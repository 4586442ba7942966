use std::time::Duration;

use helki_domain::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_RETRY_ATTEMPTS, MAX_BACKOFF_SHIFT, MAX_RETRY_ATTEMPTS,
    REQUEST_TIMEOUT_SECS,
};
use helki_domain::HelkiError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::errors::InfraError;

/// HTTP client with bounded retry, exponential backoff and a per-attempt
/// timeout.
///
/// Retries happen when:
/// - the request never reached the server (connect or send failure), any method
/// - the server answered 429, any method
/// - an idempotent request timed out or got a 5xx
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HelkiError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Retries performed after the initial attempt.
    pub fn retry_attempts(&self) -> usize {
        self.retry_attempts
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// Returns the last response when the server answered, even with an
    /// error status; callers decide what a non-success status means.
    ///
    /// # Errors
    /// `HelkiError::TransientTransport` when no response was obtained after
    /// the final attempt, `HelkiError::Config` for requests that cannot be
    /// built, `HelkiError::Internal` for bodies that cannot be replayed.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HelkiError> {
        let attempts = self.retry_attempts + 1;

        for attempt in 0..attempts {
            let cloned_builder = builder.try_clone().ok_or_else(|| {
                HelkiError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            let request = cloned_builder.build().map_err(|err| {
                let infra: InfraError = err.into();
                HelkiError::from(infra)
            })?;

            let method = request.method().clone();
            let url = request.url().clone();
            let idempotent = is_idempotent(&method);
            let last_attempt = attempt + 1 == attempts;
            debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %url, %status, "received HTTP response");

                    if !last_attempt && should_retry_status(status, idempotent) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    if !status.is_success() {
                        warn!(attempts = attempt + 1, %method, %url, %status, "HTTP request failed");
                    }
                    return Ok(response);
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %url, error = %err, "HTTP request failed");

                    if !last_attempt && should_retry_error(&err, idempotent) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    warn!(attempts = attempt + 1, %method, %url, error = %err, "HTTP request gave up");
                    let infra: InfraError = err.into();
                    return Err(HelkiError::from(infra));
                }
            }
        }

        Err(HelkiError::Internal("http client exhausted retries without producing a result".into()))
    }

    /// Delay before retry number `retry_number` (1-based).
    pub fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = (retry_number.saturating_sub(1) as u32).min(MAX_BACKOFF_SHIFT);
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        debug!(retry = retry_number, delay_ms = delay.as_millis() as u64, "backing off before retry");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    retry_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the number of retries after the initial attempt.
    ///
    /// Clamped to [`MAX_RETRY_ATTEMPTS`] at build time so every retry waits
    /// longer than the one before.
    pub fn retry_attempts(mut self, retries: usize) -> Self {
        self.retry_attempts = retries;
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, HelkiError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            HelkiError::from(infra)
        })?;

        let retry_attempts = self.retry_attempts.min(MAX_RETRY_ATTEMPTS);
        if retry_attempts < self.retry_attempts {
            warn!(
                requested = self.retry_attempts,
                max = MAX_RETRY_ATTEMPTS,
                "retry attempts clamped to the backoff range"
            );
        }

        Ok(HttpClient {
            client,
            retry_attempts,
            base_backoff: self.base_backoff,
        })
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(method.as_str(), "GET" | "HEAD" | "OPTIONS" | "PUT" | "DELETE" | "TRACE")
}

fn should_retry_status(status: StatusCode, idempotent: bool) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    idempotent && status.is_server_error()
}

fn should_retry_error(err: &reqwest::Error, idempotent: bool) -> bool {
    if err.is_builder() || err.is_redirect() {
        return false;
    }
    // The request may have reached the server before the deadline.
    if err.is_timeout() {
        return idempotent;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return true;
        }
    }
    err.is_request()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Local server that accepts each connection and hangs up without
    /// answering, recording when every attempt arrived.
    async fn hang_up_server() -> (String, Arc<Mutex<Vec<Instant>>>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let arrivals = Arc::new(Mutex::new(Vec::new()));
        let recorded = arrivals.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                recorded.lock().unwrap().push(Instant::now());
                drop(stream);
            }
        });
        (url, arrivals)
    }

    fn client_with_retries(retries: usize) -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .retry_attempts(retries)
            .build()
            .expect("http client")
    }

    #[test]
    fn backoff_doubles_each_retry() {
        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(100))
            .build()
            .expect("http client");

        let delays: Vec<Duration> = (1..=5).map(|n| client.backoff_delay(n)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[4], Duration::from_millis(1600));
        assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn backoff_is_capped() {
        let client = client_with_retries(0);
        assert_eq!(client.backoff_delay(50), client.backoff_delay(9));
    }

    #[test]
    fn retry_count_is_clamped_to_increasing_backoff() {
        let client = client_with_retries(50);
        assert_eq!(client.retry_attempts(), MAX_RETRY_ATTEMPTS);

        let delays: Vec<Duration> =
            (1..=client.retry_attempts()).map(|n| client.backoff_delay(n)).collect();
        assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn retry_count_within_range_is_kept() {
        assert_eq!(client_with_retries(MAX_RETRY_ATTEMPTS).retry_attempts(), MAX_RETRY_ATTEMPTS);
        assert_eq!(client_with_retries(0).retry_attempts(), 0);
    }

    #[test]
    fn status_predicate() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS, false));
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS, true));
        assert!(should_retry_status(StatusCode::BAD_GATEWAY, true));
        assert!(!should_retry_status(StatusCode::INTERNAL_SERVER_ERROR, false));
        assert!(!should_retry_status(StatusCode::NOT_FOUND, true));
    }

    #[test]
    fn idempotent_methods() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::PUT));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PATCH));
    }

    #[test]
    fn defaults_match_client_contract() {
        let client = HttpClient::new().expect("http client");
        assert_eq!(client.retry_attempts(), DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(client.backoff_delay(1), Duration::from_millis(DEFAULT_BASE_BACKOFF_MS));
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_retries(3);
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_get_server_errors_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_retries(3);
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_response_when_get_retries_run_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_retries(2);
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_retries(3);
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = client_with_retries(3);
        let request = client.request(Method::POST, server.uri()).body("{}");
        let response = client.send(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_post_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_retries(3);
        let request = client.request(Method::POST, server.uri()).body("{}");
        let response = client.send(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_on_network_failure_then_gives_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{}", addr);

        let client = client_with_retries(2);

        let started = std::time::Instant::now();
        let result = client.send(client.request(Method::GET, &url)).await;
        match result {
            Err(HelkiError::TransientTransport(msg)) => {
                assert!(msg.to_lowercase().contains("http"));
            }
            other => panic!("expected transient transport error, got {:?}", other),
        }
        // two retries: 5ms + 10ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_with_growing_delays() {
        let (url, arrivals) = hang_up_server().await;
        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(20))
            .retry_attempts(3)
            .build()
            .expect("http client");

        let result = client.send(client.request(Method::GET, &url)).await;
        assert!(matches!(result, Err(HelkiError::TransientTransport(_))));

        let arrivals = arrivals.lock().unwrap().clone();
        assert_eq!(arrivals.len(), 4);

        let gaps: Vec<Duration> = arrivals.windows(2).map(|pair| pair[1] - pair[0]).collect();
        for (retry, gap) in gaps.iter().enumerate() {
            let expected = client.backoff_delay(retry + 1);
            assert!(*gap >= expected, "retry {} came after {gap:?}", retry + 1);
        }
        assert!(gaps.windows(2).all(|pair| pair[0] < pair[1]), "gaps not increasing: {gaps:?}");
    }

    #[tokio::test]
    async fn dropped_connection_retried_for_post() {
        let (url, arrivals) = hang_up_server().await;
        let client = client_with_retries(2);

        let request = client.request(Method::POST, &url).body("{}");
        assert!(client.send(request).await.is_err());
        assert_eq!(arrivals.lock().unwrap().len(), 3);
    }
}
