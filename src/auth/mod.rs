//! Multi-factor authentication orchestration.
//!
//! Flow Overview:
//! 1) `authenticate` starts a login and returns `SUCCESS` or `MFA_REQUIRED`
//!    with the enrolled devices and a state token.
//! 2) Out-of-band factors are sent with `trigger_challenge`; push factors are
//!    approved with `trigger_push`, which polls while the provider reports
//!    `WAITING`.
//! 3) `mfa_check` submits a one-time code for the selected device.
//!
//! The state token correlates the calls of one attempt. Ordering is not
//! enforced here; the provider rejects stale or replayed tokens.

pub mod bridge;
pub mod error;
pub mod factors;
pub mod groups;
pub mod okta;
pub mod onelogin;
pub mod transport;
pub mod types;

pub use self::error::AuthError;
pub use self::types::{AuthData, AuthMfaDevice, AuthResponse, AuthStatus};

use async_trait::async_trait;
use secrecy::SecretString;
use std::{collections::BTreeSet, fmt, str::FromStr, sync::Arc, time::Duration};

use self::{
    bridge::DEFAULT_AUTH_RESPONSE_TIMEOUT,
    okta::{OktaAuthConnector, OktaConfig},
    onelogin::{OneLoginAuthConnector, OneLoginConfig},
    transport::RetryPolicy,
};

/// Factor result reported while a push notification is unanswered.
pub const FACTOR_RESULT_WAITING: &str = "WAITING";

const DEFAULT_PUSH_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_PUSH_DEADLINE: Duration = Duration::from_secs(120);

/// Login state machine implemented once per identity provider.
#[async_trait]
pub trait AuthConnector: Send + Sync {
    /// Provider identifier used in logs and errors.
    fn provider(&self) -> &'static str;

    /// Start a login with username and password.
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthResponse, AuthError>;

    /// Ask the provider to deliver a code for a device that requires a trigger.
    async fn trigger_challenge(
        &self,
        state_token: &str,
        device_id: &str,
    ) -> Result<AuthResponse, AuthError>;

    /// Send a push notification and wait for the user to answer it.
    async fn trigger_push(
        &self,
        state_token: &str,
        device_id: &str,
    ) -> Result<AuthResponse, AuthError>;

    /// Verify a one-time code.
    async fn mfa_check(
        &self,
        state_token: &str,
        device_id: &str,
        otp_token: &str,
    ) -> Result<AuthResponse, AuthError>;

    /// Resolve the group names of an authenticated user.
    async fn get_groups(&self, auth_data: &AuthData) -> Result<BTreeSet<String>, AuthError>;
}

/// Timing and retry settings shared by all connectors.
#[derive(Clone, Copy, Debug)]
pub struct AuthConfig {
    response_timeout: Duration,
    push_poll_interval: Duration,
    push_deadline: Duration,
    retry: RetryPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    /// Defaults: 45s provider response timeout, 100ms push poll interval,
    /// 2m overall push deadline, 3 transport attempts from 250ms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            response_timeout: DEFAULT_AUTH_RESPONSE_TIMEOUT,
            push_poll_interval: DEFAULT_PUSH_POLL_INTERVAL,
            push_deadline: DEFAULT_PUSH_DEADLINE,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_push_poll_interval(mut self, interval: Duration) -> Self {
        self.push_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_push_deadline(mut self, deadline: Duration) -> Self {
        self.push_deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    #[must_use]
    pub fn push_poll_interval(&self) -> Duration {
        self.push_poll_interval
    }

    #[must_use]
    pub fn push_deadline(&self) -> Duration {
        self.push_deadline
    }

    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provider {
    Okta,
    OneLogin,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Okta => "okta",
            Self::OneLogin => "onelogin",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "okta" => Ok(Self::Okta),
            "onelogin" => Ok(Self::OneLogin),
            other => Err(format!("unsupported identity provider: {other}")),
        }
    }
}

/// Provider-specific connection settings.
#[derive(Clone, Debug)]
pub enum ProviderConfig {
    Okta(OktaConfig),
    OneLogin(OneLoginConfig),
}

impl ProviderConfig {
    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            Self::Okta(_) => Provider::Okta,
            Self::OneLogin(_) => Provider::OneLogin,
        }
    }
}

/// Build the connector for the configured provider.
///
/// # Errors
/// Returns an error if the provider client cannot be constructed.
pub fn connector(
    provider: ProviderConfig,
    config: AuthConfig,
) -> Result<Arc<dyn AuthConnector>, AuthError> {
    let connector: Arc<dyn AuthConnector> = match provider {
        ProviderConfig::Okta(okta) => Arc::new(OktaAuthConnector::new(okta, config)?),
        ProviderConfig::OneLogin(onelogin) => {
            Arc::new(OneLoginAuthConnector::new(onelogin, config)?)
        }
    };
    Ok(connector)
}
