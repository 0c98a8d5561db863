use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Typed failure of an authentication step.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("MFA setup required: {0}")]
    MfaSetupRequired(String),
    #[error("no response from identity provider after {0:?}")]
    AuthResponseWaitTimeout(Duration),
    #[error("factor validation failed: {0}")]
    FactorValidation(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("push notification was rejected")]
    PushRejected,
    #[error("push notification timed out: {0}")]
    PushTimeout(String),
    #[error("{operation} is not implemented for {provider}")]
    NotImplemented {
        provider: &'static str,
        operation: &'static str,
    },
    #[error("identity provider unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Stable identifier for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoginFailed(_) => "login_failed",
            Self::MfaSetupRequired(_) => "mfa_setup_required",
            Self::AuthResponseWaitTimeout(_) => "auth_response_wait_timeout",
            Self::FactorValidation(_) => "factor_validation",
            Self::AuthFailed(_) => "auth_failed",
            Self::PushRejected => "push_rejected",
            Self::PushTimeout(_) => "push_timeout",
            Self::NotImplemented { .. } => "not_implemented",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// HTTP status an API boundary reports for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::LoginFailed(_)
            | Self::AuthFailed(_)
            | Self::PushRejected
            | Self::PushTimeout(_) => StatusCode::UNAUTHORIZED,
            Self::MfaSetupRequired(_) | Self::FactorValidation(_) => StatusCode::BAD_REQUEST,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::AuthResponseWaitTimeout(_) | Self::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    pub(crate) fn not_implemented(provider: &'static str, operation: &'static str) -> Self {
        Self::NotImplemented {
            provider,
            operation,
        }
    }
}
