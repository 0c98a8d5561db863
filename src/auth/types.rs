//! Uniform authentication result shared by every identity provider.

use crate::auth::AuthError;
use serde::Serialize;

/// Stage of a login attempt after the last provider round-trip.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Success,
    MfaRequired,
    MfaChallenge,
}

impl AuthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::MfaRequired => "MFA_REQUIRED",
            Self::MfaChallenge => "MFA_CHALLENGE",
        }
    }
}

/// A single enrolled MFA factor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AuthMfaDevice {
    pub id: String,
    pub name: String,
    pub requires_trigger: bool,
}

/// Identity and session payload of an [`AuthResponse`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AuthData {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_token: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<AuthMfaDevice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor_result: Option<String>,
}

impl AuthData {
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            ..Self::default()
        }
    }
}

/// Result of any authentication step.
///
/// Only the status-specific constructors build a response, so `status` and
/// the populated fields of `data` always agree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AuthResponse {
    status: AuthStatus,
    data: AuthData,
}

impl AuthResponse {
    #[must_use]
    pub fn success(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Success,
            data: AuthData::new(user_id, username),
        }
    }

    /// # Errors
    /// Returns `AuthError::MfaSetupRequired` if `devices` is empty, since the
    /// user would have no way to finish the login.
    pub fn mfa_required(
        user_id: impl Into<String>,
        username: impl Into<String>,
        state_token: String,
        devices: Vec<AuthMfaDevice>,
    ) -> Result<Self, AuthError> {
        if devices.is_empty() {
            return Err(AuthError::MfaSetupRequired(
                "no MFA device is available for this account".to_string(),
            ));
        }

        Ok(Self {
            status: AuthStatus::MfaRequired,
            data: AuthData {
                state_token: Some(state_token),
                devices,
                ..AuthData::new(user_id, username)
            },
        })
    }

    #[must_use]
    pub fn mfa_challenge(
        user_id: impl Into<String>,
        username: impl Into<String>,
        state_token: Option<String>,
        factor_result: Option<String>,
    ) -> Self {
        Self {
            status: AuthStatus::MfaChallenge,
            data: AuthData {
                state_token,
                factor_result,
                ..AuthData::new(user_id, username)
            },
        }
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    #[must_use]
    pub fn data(&self) -> &AuthData {
        &self.data
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == AuthStatus::Success
    }

    #[must_use]
    pub fn factor_result(&self) -> Option<&str> {
        self.data.factor_result.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_has_no_mfa_fields() {
        let response = AuthResponse::success("00u1", "jane@example.com");
        assert!(response.is_success());
        assert_eq!(response.data().state_token, None);
        assert!(response.data().devices.is_empty());

        let value = serde_json::to_value(&response).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "status": "SUCCESS",
                "data": { "user_id": "00u1", "username": "jane@example.com" }
            })
        );
    }

    #[test]
    fn mfa_required_serializes_devices() -> Result<(), AuthError> {
        let response = AuthResponse::mfa_required(
            "00u1",
            "jane@example.com",
            "state".to_string(),
            vec![AuthMfaDevice {
                id: "sms1".to_string(),
                name: "Okta Text Message Code".to_string(),
                requires_trigger: true,
            }],
        )?;
        let value = serde_json::to_value(&response).unwrap_or_default();
        assert_eq!(value["status"], "MFA_REQUIRED");
        assert_eq!(value["data"]["state_token"], "state");
        assert_eq!(value["data"]["devices"][0]["requires_trigger"], true);
        Ok(())
    }

    #[test]
    fn mfa_required_needs_a_device() {
        let result = AuthResponse::mfa_required("00u1", "jane", "state".to_string(), Vec::new());
        assert!(matches!(result, Err(AuthError::MfaSetupRequired(_))));
    }

    #[test]
    fn status_as_str_matches_serde() {
        for status in [
            AuthStatus::Success,
            AuthStatus::MfaRequired,
            AuthStatus::MfaChallenge,
        ] {
            assert_eq!(
                serde_json::to_value(status).unwrap_or_default(),
                json!(status.as_str())
            );
        }
    }
}
