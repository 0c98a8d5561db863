//! Okta connector.
//!
//! Every authn call runs on its own task and reports back through an
//! [`OktaAuthEvent`]. The event is normalized by the handler kind of the
//! current step and resolves the completion the caller is waiting on, so a
//! slow Okta never blocks a caller beyond the configured response timeout.

pub mod client;
pub mod model;
pub mod state;

use crate::auth::{
    bridge::CompletionBridge, AuthConfig, AuthConnector, AuthData, AuthError, AuthResponse,
    AuthStatus, FACTOR_RESULT_WAITING,
};
use async_trait::async_trait;
use secrecy::SecretString;
use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, instrument};

use self::{
    client::OktaClient,
    model::AuthnResult,
    state::{OktaAuthEvent, OktaStateHandler},
};
use crate::auth::transport::VendorError;

const PROVIDER: &str = "okta";

const FACTOR_RESULT_REJECTED: &str = "REJECTED";
const FACTOR_RESULT_TIMEOUT: &str = "TIMEOUT";

#[derive(Clone, Debug)]
pub struct OktaConfig {
    base_url: String,
    api_key: SecretString,
}

impl OktaConfig {
    /// `base_url` is the Okta org origin, e.g. `https://example.okta.com`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }
}

pub struct OktaAuthConnector {
    client: Arc<OktaClient>,
    bridge: CompletionBridge,
    push_poll_interval: Duration,
    push_deadline: Duration,
}

impl OktaAuthConnector {
    /// # Errors
    /// Returns `AuthError::ServiceUnavailable` if the Okta client cannot be built.
    pub fn new(config: OktaConfig, auth: AuthConfig) -> Result<Self, AuthError> {
        let client = OktaClient::new(&config.base_url, config.api_key, auth.retry())
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            bridge: CompletionBridge::new(auth.response_timeout()),
            push_poll_interval: auth.push_poll_interval(),
            push_deadline: auth.push_deadline(),
        })
    }

    /// Run `call` on its own task and wait for `handler` to resolve its event.
    async fn dispatch<F, Fut>(
        &self,
        handler: OktaStateHandler,
        call: F,
    ) -> Result<AuthResponse, AuthError>
    where
        F: FnOnce(Arc<OktaClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<AuthnResult, VendorError>> + Send + 'static,
    {
        let client = self.client.clone();

        self.bridge
            .await_result(move |completion| {
                tokio::spawn(async move {
                    let event = OktaAuthEvent::from_outcome(call(client).await);
                    handler.handle(event, completion);
                });
            })
            .await
    }

    async fn verify(
        &self,
        handler: OktaStateHandler,
        state_token: &str,
        device_id: &str,
        pass_code: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        let state_token = state_token.to_string();
        let device_id = device_id.to_string();
        let pass_code = pass_code.map(str::to_string);

        self.dispatch(handler, move |client| async move {
            client
                .verify_factor(&device_id, &state_token, pass_code.as_deref())
                .await
        })
        .await
    }

    async fn poll_push(
        &self,
        state_token: &str,
        device_id: &str,
        deadline: Instant,
    ) -> Result<AuthResponse, AuthError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let response = self
                .verify(OktaStateHandler::Push, state_token, device_id, None)
                .await?;

            match (response.status(), response.factor_result()) {
                (AuthStatus::Success, _) => {
                    info!(attempts, "push approved");
                    return Ok(response);
                }
                (AuthStatus::MfaChallenge, Some(FACTOR_RESULT_WAITING)) => {
                    debug!(attempts, "push still waiting");
                }
                (AuthStatus::MfaChallenge, Some(FACTOR_RESULT_REJECTED)) => {
                    return Err(AuthError::PushRejected);
                }
                (AuthStatus::MfaChallenge, Some(FACTOR_RESULT_TIMEOUT)) => {
                    return Err(AuthError::PushTimeout(
                        "Okta reported the push notification as expired".to_string(),
                    ));
                }
                (status, factor_result) => {
                    return Err(AuthError::AuthFailed(format!(
                        "unexpected push result: {} {}",
                        status.as_str(),
                        factor_result.unwrap_or("none")
                    )));
                }
            }

            if Instant::now() + self.push_poll_interval >= deadline {
                return Err(AuthError::PushTimeout(format!(
                    "no answer after {attempts} attempts within {:?}",
                    self.push_deadline
                )));
            }

            sleep(self.push_poll_interval).await;
        }
    }
}

#[async_trait]
impl AuthConnector for OktaAuthConnector {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, AuthError> {
        let login = username.to_string();
        let password = password.clone();

        let result = self
            .dispatch(OktaStateHandler::InitialLogin, move |client| async move {
                client.authenticate(&login, &password).await
            })
            .await;

        match result {
            Ok(response) => {
                info!(status = response.status().as_str(), "okta login");
                Ok(response)
            }
            Err(AuthError::AuthResponseWaitTimeout(timeout)) => {
                error!("No response from Okta within {:?}", timeout);
                Err(AuthError::LoginFailed(format!(
                    "no response from Okta within {timeout:?}"
                )))
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, state_token))]
    async fn trigger_challenge(
        &self,
        state_token: &str,
        device_id: &str,
    ) -> Result<AuthResponse, AuthError> {
        self.verify(OktaStateHandler::TriggerChallenge, state_token, device_id, None)
            .await
    }

    #[instrument(skip(self, state_token))]
    async fn trigger_push(
        &self,
        state_token: &str,
        device_id: &str,
    ) -> Result<AuthResponse, AuthError> {
        let deadline = Instant::now() + self.push_deadline;

        // The deadline also bounds a verify call that is still in flight.
        timeout_at(deadline, self.poll_push(state_token, device_id, deadline))
            .await
            .unwrap_or_else(|_| {
                Err(AuthError::PushTimeout(format!(
                    "no answer within {:?}",
                    self.push_deadline
                )))
            })
    }

    #[instrument(skip(self, state_token, otp_token))]
    async fn mfa_check(
        &self,
        state_token: &str,
        device_id: &str,
        otp_token: &str,
    ) -> Result<AuthResponse, AuthError> {
        self.verify(
            OktaStateHandler::FactorVerify,
            state_token,
            device_id,
            Some(otp_token),
        )
        .await
    }

    #[instrument(skip(self, auth_data), fields(user_id = %auth_data.user_id))]
    async fn get_groups(&self, auth_data: &AuthData) -> Result<BTreeSet<String>, AuthError> {
        let groups = self
            .client
            .list_user_groups(&auth_data.user_id)
            .await
            .map_err(|e| {
                error!("Failed to list Okta groups: {}", e);
                AuthError::ServiceUnavailable(e.to_string())
            })?;

        Ok(groups.into_iter().map(|group| group.profile.name).collect())
    }
}
