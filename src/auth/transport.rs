//! HTTP transport shared by the identity provider clients.
//!
//! Requests are retried with exponential backoff and jitter when the provider
//! answers 5xx or the connection fails. Client errors (4xx) are returned on the
//! first attempt so credential and factor failures surface immediately.

use crate::APP_USER_AGENT;
use rand::Rng;
use reqwest::{header::HeaderMap, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

const VENDOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const VENDOR_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Failure talking to an identity provider, before any auth semantics apply.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("{status} - {message}")]
    Http {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl VendorError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Vendor-specific error code, e.g. Okta's `E0000068`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. } => message,
            Self::Transport(message) | Self::Decode(message) => message,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before `attempt` (1-based): zero for the first attempt, then the
    /// base delay doubled per retry with +/-10% jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        let delay = self.base_delay.saturating_mul(2u32.pow(exponent));
        let jitter = rand::thread_rng().gen_range(0.9..1.1);
        delay.mul_f64(jitter)
    }
}

/// Decoded provider response.
#[derive(Debug)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone, Debug)]
pub struct VendorTransport {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl VendorTransport {
    /// Build a transport for the provider origin at `base_url`.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self, VendorError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| VendorError::Transport(format!("invalid base URL {base_url}: {e}")))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(VendorError::Transport(format!(
                "unsupported scheme {}",
                base_url.scheme()
            )));
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(VENDOR_CONNECT_TIMEOUT)
            .timeout(VENDOR_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VendorError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolve `path` against the provider origin.
    ///
    /// # Errors
    /// Returns an error if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, VendorError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| VendorError::Transport(format!("invalid endpoint {path}: {e}")))?;

        debug!("endpoint URL: {}", url);

        Ok(url)
    }

    /// Resolve `path` and append percent-encoded `segments`, so opaque
    /// identifiers can never alter the request path.
    ///
    /// # Errors
    /// Returns an error if the joined URL is invalid.
    pub fn endpoint_with(&self, path: &str, segments: &[&str]) -> Result<Url, VendorError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| VendorError::Transport(format!("invalid endpoint {path}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Whether `url` points at the same origin as the provider.
    #[must_use]
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    /// Send `request`, retrying 5xx responses and connection failures.
    ///
    /// # Errors
    /// Returns `VendorError::Http` for non-success statuses (after retries for
    /// 5xx), `VendorError::Transport` for network failures, and
    /// `VendorError::Decode` if the body is not JSON.
    pub async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<JsonResponse, VendorError> {
        let mut last_error = VendorError::Transport("no attempt made".to_string());

        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let backoff = self.retry.backoff(attempt);
                warn!(operation, attempt, "Backing off for {:?}", backoff);
                sleep(backoff).await;
            }

            let Some(request) = request.try_clone() else {
                return Err(VendorError::Transport(
                    "request body cannot be retried".to_string(),
                ));
            };

            let span = info_span!("vendor.request", operation, attempt);
            let response = match request.send().instrument(span).await {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(operation, attempt, "Error reaching identity provider: {}", e);
                    last_error = VendorError::Transport(e.to_string());
                    continue;
                }
                Err(e) => return Err(VendorError::Transport(e.to_string())),
            };

            let status = response.status();
            let headers = response.headers().clone();
            let body = decode_body(response).await;

            if status.is_success() {
                return Ok(JsonResponse {
                    status,
                    headers,
                    body: body?,
                });
            }

            let body = body.unwrap_or(Value::Null);
            let (code, message) = vendor_error_fields(&body);
            let error = VendorError::Http {
                status,
                code,
                message,
            };

            if !status.is_server_error() {
                return Err(error);
            }

            warn!(operation, attempt, "Identity provider error: {}", error);
            last_error = error;
        }

        Err(last_error)
    }
}

async fn decode_body(response: reqwest::Response) -> Result<Value, VendorError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| VendorError::Transport(e.to_string()))?;

    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|e| VendorError::Decode(e.to_string()))
}

/// Extract the error code and message from an Okta or OneLogin error body.
pub(crate) fn vendor_error_fields(body: &Value) -> (Option<String>, String) {
    // Okta: {"errorCode": "E0000004", "errorSummary": "Authentication failed"}
    if let Some(summary) = body.get("errorSummary").and_then(Value::as_str) {
        let code = body
            .get("errorCode")
            .and_then(Value::as_str)
            .map(str::to_string);
        return (code, summary.to_string());
    }

    // OneLogin: {"status": {"error": true, "code": 400, "type": "bad request", "message": "..."}}
    if let Some(status) = body.get("status").filter(|v| v.is_object()) {
        let code = status.get("type").and_then(Value::as_str).map(str::to_string);
        let message = status
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        return (code, message);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    (None, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(200));
        assert_eq!(policy.backoff(1), Duration::ZERO);

        let second = policy.backoff(2);
        assert!(second >= Duration::from_millis(180) && second <= Duration::from_millis(220));

        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(360) && third <= Duration::from_millis(440));
    }

    #[test]
    fn endpoint_with_encodes_segments() -> anyhow::Result<()> {
        let transport = VendorTransport::new("https://example.okta.com", fast_retry())?;
        let url = transport.endpoint_with("/api/v1/authn/factors/", &["abc/../x", "verify"])?;
        assert_eq!(
            url.as_str(),
            "https://example.okta.com/api/v1/authn/factors/abc%2F..%2Fx/verify"
        );
        assert!(transport.is_same_origin(&url));

        let other = Url::parse("https://evil.example.com/api/v1/users")?;
        assert!(!transport.is_same_origin(&other));
        Ok(())
    }

    #[test]
    fn retry_policy_needs_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(VendorTransport::new("ftp://okta.example.com", fast_retry()).is_err());
        assert!(VendorTransport::new("not a url", fast_retry()).is_err());
    }

    #[test]
    fn error_fields_okta_and_onelogin() {
        let okta = json!({"errorCode": "E0000004", "errorSummary": "Authentication failed"});
        assert_eq!(
            vendor_error_fields(&okta),
            (
                Some("E0000004".to_string()),
                "Authentication failed".to_string()
            )
        );

        let onelogin = json!({
            "status": {"error": true, "code": 400, "type": "bad request", "message": "MFA is required"}
        });
        assert_eq!(
            vendor_error_fields(&onelogin),
            (Some("bad request".to_string()), "MFA is required".to_string())
        );

        assert_eq!(vendor_error_fields(&Value::Null), (None, String::new()));
    }

    #[tokio::test]
    async fn retries_server_errors() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "busy"})))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = VendorTransport::new(&server.uri(), fast_retry())?;
        let url = transport.endpoint("/flaky")?;
        let response = transport
            .send("flaky", transport.client().get(url))
            .await?;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["ok"], true);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .expect(3)
            .mount(&server)
            .await;

        let transport = VendorTransport::new(&server.uri(), fast_retry())?;
        let url = transport.endpoint("/down")?;
        let result = transport.send("down", transport.client().get(url)).await;

        assert!(matches!(
            result,
            Err(VendorError::Http { status, ref message, .. })
                if status == StatusCode::INTERNAL_SERVER_ERROR && message == "boom"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errorCode": "E0000004",
                "errorSummary": "Authentication failed"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = VendorTransport::new(&server.uri(), fast_retry())?;
        let url = transport.endpoint("/denied")?;
        let result = transport.send("denied", transport.client().get(url)).await;

        let Err(error) = result else {
            anyhow::bail!("expected an error");
        };
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(error.code(), Some("E0000004"));
        Ok(())
    }
}
