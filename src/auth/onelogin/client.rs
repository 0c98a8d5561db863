use crate::auth::{
    onelogin::model::{Envelope, LoginData, User},
    transport::{JsonResponse, RetryPolicy, VendorError, VendorTransport},
};
use reqwest::{header::AUTHORIZATION, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, instrument};

/// Refresh the access token this long before OneLogin expires it.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// OneLogin's documented lifetime, used when the token response omits it.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(36_000);

#[derive(Debug)]
struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// HTTP client for the OneLogin API v1.
#[derive(Debug)]
pub struct OneLoginClient {
    transport: VendorTransport,
    client_id: String,
    client_secret: SecretString,
    subdomain: String,
    token: Mutex<Option<AccessToken>>,
}

impl OneLoginClient {
    /// # Errors
    /// Returns an error if `base_url` is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        client_id: String,
        client_secret: SecretString,
        subdomain: String,
        retry: RetryPolicy,
    ) -> Result<Self, VendorError> {
        Ok(Self {
            transport: VendorTransport::new(base_url, retry)?,
            client_id,
            client_secret,
            subdomain,
            token: Mutex::new(None),
        })
    }

    /// Cached client-credentials access token, refreshed near expiry.
    ///
    /// # Errors
    /// Returns an error if OneLogin does not issue a token.
    pub async fn access_token(&self) -> Result<SecretString, VendorError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, VendorError> {
        let url = self.transport.endpoint("/auth/oauth2/token")?;

        let request = self
            .transport
            .client()
            .post(url)
            .header(
                AUTHORIZATION,
                format!(
                    "client_id:{}, client_secret:{}",
                    self.client_id,
                    self.client_secret.expose_secret()
                ),
            )
            .json(&json!({ "grant_type": "client_credentials" }));

        let response = self.transport.send("onelogin.token", request).await?;

        // Older tenants wrap the token in the v1 envelope.
        let body = response
            .body
            .get("data")
            .and_then(|data| data.get(0))
            .cloned()
            .unwrap_or(response.body);

        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| VendorError::Decode("token response has no access_token".to_string()))?;

        let ttl = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_TOKEN_TTL, Duration::from_secs);

        debug!("issued OneLogin access token valid for {:?}", ttl);

        Ok(AccessToken {
            value: SecretString::from(value.to_string()),
            expires_at: Instant::now() + ttl,
        })
    }

    /// Drop the cached token if it is still the one OneLogin rejected.
    async fn invalidate_token(&self, rejected: &SecretString) {
        let mut cached = self.token.lock().await;

        if cached
            .as_ref()
            .is_some_and(|token| token.value.expose_secret() == rejected.expose_secret())
        {
            *cached = None;
        }
    }

    /// Send a bearer-authorized request built by `build` and unwrap its
    /// envelope. A 401 clears the cached token and the request is sent once
    /// more with a fresh one.
    async fn send_authorized<T, F>(&self, operation: &'static str, build: F) -> Result<T, VendorError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let token = self.access_token().await?;

        match self.send_with_token(operation, build(), &token).await {
            Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED) => {
                debug!(operation, "access token rejected, requesting a new one");
                self.invalidate_token(&token).await;

                let token = self.access_token().await?;
                self.send_with_token(operation, build(), &token).await
            }
            result => result,
        }
    }

    async fn send_with_token<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        token: &SecretString,
    ) -> Result<T, VendorError> {
        let request = request.header(AUTHORIZATION, format!("bearer:{}", token.expose_secret()));
        let response = self.transport.send(operation, request).await?;

        first(response)
    }

    /// Create a session login token.
    ///
    /// # Errors
    /// Returns an error if OneLogin rejects the credentials or cannot be reached.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginData, VendorError> {
        let url = self.transport.endpoint("/api/1/login/auth")?;

        let payload = json!({
            "username_or_email": username,
            "password": password.expose_secret(),
            "subdomain": self.subdomain,
        });

        self.send_authorized("onelogin.login", || {
            self.transport.client().post(url.clone()).json(&payload)
        })
        .await
    }

    /// Verify a one-time code against the pending login.
    ///
    /// # Errors
    /// Returns an error if OneLogin rejects the code or cannot be reached.
    #[instrument(skip(self, state_token, otp_token))]
    pub async fn verify_factor(
        &self,
        device_id: &str,
        state_token: &str,
        otp_token: &str,
    ) -> Result<LoginData, VendorError> {
        let url = self.transport.endpoint("/api/1/login/verify_factor")?;

        let payload = json!({
            "device_id": device_id,
            "state_token": state_token,
            "otp_token": otp_token,
        });

        self.send_authorized("onelogin.verify_factor", || {
            self.transport.client().post(url.clone()).json(&payload)
        })
        .await
    }

    /// # Errors
    /// Returns an error if the user does not exist or OneLogin cannot be reached.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<User, VendorError> {
        let url = self.transport.endpoint_with("/api/1/users/", &[user_id])?;

        self.send_authorized("onelogin.get_user", || self.transport.client().get(url.clone()))
            .await
    }
}

/// First `data` entry of an envelope. An envelope flagged as an error is
/// surfaced as `VendorError::Http` even when the HTTP status was 2xx.
fn first<T: DeserializeOwned>(response: JsonResponse) -> Result<T, VendorError> {
    let envelope: Envelope<T> =
        serde_json::from_value(response.body).map_err(|e| VendorError::Decode(e.to_string()))?;

    if let Some(status) = envelope.status.as_ref().filter(|status| status.error) {
        return Err(VendorError::Http {
            status: StatusCode::from_u16(status.code).unwrap_or(response.status),
            code: status.kind.clone(),
            message: status.message.clone().unwrap_or_default(),
        });
    }

    envelope
        .data
        .into_iter()
        .next()
        .ok_or_else(|| VendorError::Decode("response has no data".to_string()))
}
