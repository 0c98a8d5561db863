//! OneLogin connector.
//!
//! OneLogin's login API is request/response, so calls are awaited directly
//! and the response wait timeout never applies. OneLogin cannot trigger a
//! challenge or push on demand.

pub mod client;
pub mod model;

use crate::auth::{
    factors::{select_devices, CandidateFactor, ONELOGIN_FACTORS},
    groups::parse_ldap_groups,
    transport::VendorError,
    AuthConfig, AuthConnector, AuthData, AuthError, AuthResponse,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use std::collections::BTreeSet;
use tracing::{error, info, instrument};

use self::{client::OneLoginClient, model::LoginData};

const PROVIDER: &str = "onelogin";

#[derive(Clone, Debug)]
pub struct OneLoginConfig {
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    subdomain: String,
}

impl OneLoginConfig {
    /// `base_url` is the regional API origin, e.g. `https://api.us.onelogin.com`;
    /// `subdomain` is the tenant, as in `{subdomain}.onelogin.com`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        subdomain: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret,
            subdomain: subdomain.into(),
        }
    }

    #[must_use]
    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }
}

pub struct OneLoginAuthConnector {
    client: OneLoginClient,
}

impl OneLoginAuthConnector {
    /// # Errors
    /// Returns `AuthError::ServiceUnavailable` if the OneLogin client cannot be built.
    pub fn new(config: OneLoginConfig, auth: AuthConfig) -> Result<Self, AuthError> {
        let client = OneLoginClient::new(
            &config.base_url,
            config.client_id,
            config.client_secret,
            config.subdomain,
            auth.retry(),
        )
        .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

fn identity(data: &LoginData, fallback: &str) -> Result<(String, String), AuthError> {
    let user = data.user.as_ref().ok_or_else(|| {
        AuthError::ServiceUnavailable("OneLogin response has no user".to_string())
    })?;

    let username = user.login().unwrap_or(fallback).to_string();
    Ok((user.id.clone(), username))
}

fn normalize_login(data: LoginData, username: &str) -> Result<AuthResponse, AuthError> {
    let (user_id, username) = identity(&data, username)?;

    let Some(state_token) = data.state_token else {
        return Ok(AuthResponse::success(user_id, username));
    };

    let candidates = data
        .devices
        .into_iter()
        .filter(|device| device.is_usable())
        .map(|device| CandidateFactor {
            id: device.device_id,
            key: device.device_type,
            configured: true,
        });

    let devices = select_devices(&ONELOGIN_FACTORS, candidates)?;

    AuthResponse::mfa_required(user_id, username, state_token, devices)
}

fn login_failure(err: &VendorError) -> AuthError {
    let message = err.message().to_string();

    match err.status() {
        Some(StatusCode::BAD_REQUEST) if message.to_ascii_uppercase().contains("MFA") => {
            AuthError::MfaSetupRequired(message)
        }
        Some(status) if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS => {
            AuthError::LoginFailed(message)
        }
        _ => AuthError::ServiceUnavailable(err.to_string()),
    }
}

fn verify_failure(err: &VendorError) -> AuthError {
    let message = err.message().to_string();

    match err.status() {
        Some(StatusCode::UNAUTHORIZED) => AuthError::FactorValidation(message),
        Some(StatusCode::BAD_REQUEST) if message.to_ascii_lowercase().contains("state_token") => {
            AuthError::AuthFailed(message)
        }
        Some(StatusCode::BAD_REQUEST) => AuthError::FactorValidation(message),
        _ => AuthError::ServiceUnavailable(err.to_string()),
    }
}

#[async_trait]
impl AuthConnector for OneLoginAuthConnector {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, AuthError> {
        let data = self
            .client
            .authenticate(username, password)
            .await
            .map_err(|e| {
                error!("OneLogin login failed: {}", e);
                login_failure(&e)
            })?;

        let response = normalize_login(data, username)?;
        info!(status = response.status().as_str(), "onelogin login");

        Ok(response)
    }

    async fn trigger_challenge(
        &self,
        _state_token: &str,
        _device_id: &str,
    ) -> Result<AuthResponse, AuthError> {
        Err(AuthError::not_implemented(PROVIDER, "trigger_challenge"))
    }

    async fn trigger_push(
        &self,
        _state_token: &str,
        _device_id: &str,
    ) -> Result<AuthResponse, AuthError> {
        Err(AuthError::not_implemented(PROVIDER, "trigger_push"))
    }

    #[instrument(skip(self, state_token, otp_token))]
    async fn mfa_check(
        &self,
        state_token: &str,
        device_id: &str,
        otp_token: &str,
    ) -> Result<AuthResponse, AuthError> {
        let data = self
            .client
            .verify_factor(device_id, state_token, otp_token)
            .await
            .map_err(|e| {
                error!("OneLogin factor verification failed: {}", e);
                verify_failure(&e)
            })?;

        let (user_id, username) = identity(&data, "")?;
        Ok(AuthResponse::success(user_id, username))
    }

    #[instrument(skip(self, auth_data), fields(user_id = %auth_data.user_id))]
    async fn get_groups(&self, auth_data: &AuthData) -> Result<BTreeSet<String>, AuthError> {
        let user = self
            .client
            .get_user(&auth_data.user_id)
            .await
            .map_err(|e| {
                error!("Failed to read OneLogin user: {}", e);
                AuthError::ServiceUnavailable(e.to_string())
            })?;

        parse_ldap_groups(user.member_of.as_deref())
    }
}
