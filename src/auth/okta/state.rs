//! Okta authn events and their normalization into [`AuthResponse`].
//!
//! Every Okta round-trip ends in exactly one [`OktaAuthEvent`]. The handler
//! kind chosen by the connector decides which events it expects; anything
//! else is an unsupported state and fails with a descriptive message.

use crate::auth::{
    bridge::Completion,
    factors::{select_devices, status_message, CandidateFactor, OKTA_FACTORS},
    okta::model::{
        AuthnResult, ERROR_INVALID_PASSCODE, STATUS_MFA_CHALLENGE, STATUS_MFA_REQUIRED,
        STATUS_SUCCESS,
    },
    transport::VendorError,
    AuthError, AuthResponse,
};
use reqwest::StatusCode;
use tracing::debug;

#[derive(Debug)]
pub enum OktaAuthEvent {
    Success(AuthnResult),
    MfaRequired(AuthnResult),
    MfaChallenge(AuthnResult),
    Unknown(AuthnResult),
    Failed(VendorError),
}

impl OktaAuthEvent {
    #[must_use]
    pub fn from_outcome(outcome: Result<AuthnResult, VendorError>) -> Self {
        match outcome {
            Ok(result) => match result.status.as_str() {
                STATUS_SUCCESS => Self::Success(result),
                STATUS_MFA_REQUIRED => Self::MfaRequired(result),
                STATUS_MFA_CHALLENGE => Self::MfaChallenge(result),
                _ => Self::Unknown(result),
            },
            Err(err) => Self::Failed(err),
        }
    }
}

/// Which step of the login the event answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OktaStateHandler {
    InitialLogin,
    FactorVerify,
    TriggerChallenge,
    Push,
}

impl OktaStateHandler {
    /// Normalize `event` and resolve `completion` with the result.
    pub fn handle(self, event: OktaAuthEvent, completion: Completion<Result<AuthResponse, AuthError>>) {
        let result = self.normalize(event);

        match &result {
            Ok(response) => debug!(handler = ?self, status = response.status().as_str(), "okta event"),
            Err(err) => debug!(handler = ?self, kind = err.kind(), "okta event failed"),
        }

        completion.complete(result);
    }

    /// # Errors
    /// Returns the `AuthError` matching an unexpected state or a failed call.
    pub fn normalize(self, event: OktaAuthEvent) -> Result<AuthResponse, AuthError> {
        match event {
            OktaAuthEvent::Success(result) => on_success(&result),
            OktaAuthEvent::MfaRequired(result) if self == Self::InitialLogin => {
                on_mfa_required(result)
            }
            OktaAuthEvent::MfaChallenge(result)
                if matches!(self, Self::TriggerChallenge | Self::Push) =>
            {
                on_mfa_challenge(result)
            }
            OktaAuthEvent::MfaRequired(result)
            | OktaAuthEvent::MfaChallenge(result)
            | OktaAuthEvent::Unknown(result) => Err(self.on_unknown_state(&result)),
            OktaAuthEvent::Failed(err) => Err(self.on_failure(&err)),
        }
    }

    fn on_unknown_state(self, result: &AuthnResult) -> AuthError {
        let message = status_message(&result.status).to_string();

        if self == Self::InitialLogin
            && matches!(result.status.as_str(), "MFA_ENROLL" | "MFA_ENROLL_ACTIVATE")
        {
            return AuthError::MfaSetupRequired(message);
        }

        AuthError::AuthFailed(message)
    }

    fn on_failure(self, err: &VendorError) -> AuthError {
        let Some(status) = err.status() else {
            return AuthError::ServiceUnavailable(err.to_string());
        };

        if !status.is_client_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return AuthError::ServiceUnavailable(err.to_string());
        }

        let message = err.message().to_string();

        match (self, status) {
            (Self::InitialLogin, StatusCode::BAD_REQUEST) if mentions_mfa(&message) => {
                AuthError::MfaSetupRequired(message)
            }
            (Self::InitialLogin, _) => AuthError::LoginFailed(message),
            (Self::FactorVerify, StatusCode::BAD_REQUEST) => AuthError::FactorValidation(message),
            (Self::FactorVerify, StatusCode::FORBIDDEN)
                if err.code() == Some(ERROR_INVALID_PASSCODE) =>
            {
                AuthError::FactorValidation(message)
            }
            _ => AuthError::AuthFailed(message),
        }
    }
}

fn mentions_mfa(message: &str) -> bool {
    message.to_ascii_uppercase().contains("MFA")
}

fn identity(result: &AuthnResult) -> Option<(String, String)> {
    let user = result.embedded.user.as_ref()?;
    let login = user.profile.login.clone()?;
    Some((user.id.clone(), login))
}

fn on_success(result: &AuthnResult) -> Result<AuthResponse, AuthError> {
    let (user_id, username) = identity(result).ok_or_else(|| {
        AuthError::ServiceUnavailable("Okta success response has no user".to_string())
    })?;

    Ok(AuthResponse::success(user_id, username))
}

fn on_mfa_required(result: AuthnResult) -> Result<AuthResponse, AuthError> {
    let (user_id, username) = identity(&result).ok_or_else(|| {
        AuthError::ServiceUnavailable("Okta MFA response has no user".to_string())
    })?;

    let state_token = result.state_token.ok_or_else(|| {
        AuthError::ServiceUnavailable("Okta MFA response has no state token".to_string())
    })?;

    let candidates = result
        .embedded
        .factors
        .into_iter()
        .filter(|factor| factor.is_supported())
        .map(|factor| CandidateFactor {
            key: factor.key(),
            configured: factor.is_configured(),
            id: factor.id,
        });

    let devices = select_devices(&OKTA_FACTORS, candidates)?;

    AuthResponse::mfa_required(user_id, username, state_token, devices)
}

fn on_mfa_challenge(result: AuthnResult) -> Result<AuthResponse, AuthError> {
    let (user_id, username) = identity(&result).ok_or_else(|| {
        AuthError::ServiceUnavailable("Okta challenge response has no user".to_string())
    })?;

    Ok(AuthResponse::mfa_challenge(
        user_id,
        username,
        result.state_token,
        result.factor_result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthStatus;
    use serde_json::{json, Value};

    fn result(value: Value) -> AuthnResult {
        serde_json::from_value(value).unwrap_or_else(|e| panic!("invalid fixture: {e}"))
    }

    fn user() -> Value {
        json!({ "id": "00u1", "profile": { "login": "jane@example.com" } })
    }

    fn http_error(status: StatusCode, code: &str, message: &str) -> OktaAuthEvent {
        OktaAuthEvent::Failed(VendorError::Http {
            status,
            code: Some(code.to_string()),
            message: message.to_string(),
        })
    }

    #[test]
    fn success_carries_identity() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "SUCCESS",
            "_embedded": { "user": user() }
        }))));

        let response = OktaStateHandler::InitialLogin.normalize(event);
        assert!(matches!(
            response,
            Ok(ref r) if r.is_success() && r.data().user_id == "00u1" && r.data().username == "jane@example.com"
        ));
    }

    #[test]
    fn success_without_user_is_unavailable() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({ "status": "SUCCESS" }))));
        let response = OktaStateHandler::FactorVerify.normalize(event);
        assert!(matches!(response, Err(AuthError::ServiceUnavailable(_))));
    }

    #[test]
    fn mfa_required_filters_unsupported_factors() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "MFA_REQUIRED",
            "stateToken": "st1",
            "_embedded": {
                "user": user(),
                "factors": [
                    { "id": "q1", "factorType": "question", "provider": "OKTA" },
                    { "id": "sms1", "factorType": "sms", "provider": "OKTA", "status": "ACTIVE" },
                    { "id": "totp1", "factorType": "token:software:totp", "provider": "GOOGLE" }
                ]
            }
        }))));

        let Ok(response) = OktaStateHandler::InitialLogin.normalize(event) else {
            panic!("expected MFA_REQUIRED");
        };
        assert_eq!(response.status(), AuthStatus::MfaRequired);
        assert_eq!(response.data().state_token.as_deref(), Some("st1"));

        let devices = &response.data().devices;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "sms1");
        assert_eq!(devices[0].name, "Okta Text Message Code");
        assert!(devices[0].requires_trigger);
        assert_eq!(devices[1].name, "Google Authenticator");
        assert!(!devices[1].requires_trigger);
    }

    #[test]
    fn mfa_required_without_supported_factors_needs_setup() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "MFA_REQUIRED",
            "stateToken": "st1",
            "_embedded": {
                "user": user(),
                "factors": [
                    { "id": "q1", "factorType": "question", "provider": "OKTA" },
                    { "id": "w1", "factorType": "web", "provider": "DUO" }
                ]
            }
        }))));

        let response = OktaStateHandler::InitialLogin.normalize(event);
        assert!(matches!(response, Err(AuthError::MfaSetupRequired(_))));
    }

    #[test]
    fn mfa_required_outside_login_is_unknown_state() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "MFA_REQUIRED",
            "stateToken": "st1",
            "_embedded": { "user": user() }
        }))));

        let response = OktaStateHandler::FactorVerify.normalize(event);
        assert!(matches!(response, Err(AuthError::AuthFailed(_))));
    }

    #[test]
    fn challenge_keeps_factor_result() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "MFA_CHALLENGE",
            "stateToken": "st2",
            "factorResult": "WAITING",
            "_embedded": { "user": user() }
        }))));

        let Ok(response) = OktaStateHandler::Push.normalize(event) else {
            panic!("expected MFA_CHALLENGE");
        };
        assert_eq!(response.status(), AuthStatus::MfaChallenge);
        assert_eq!(response.factor_result(), Some("WAITING"));
        assert_eq!(response.data().state_token.as_deref(), Some("st2"));
    }

    #[test]
    fn challenge_without_user_is_unavailable() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({
            "status": "MFA_CHALLENGE",
            "stateToken": "st2",
            "factorResult": "WAITING"
        }))));

        let outcome = OktaStateHandler::Push.normalize(event);
        assert!(matches!(outcome, Err(AuthError::ServiceUnavailable(_))));
    }

    #[test]
    fn unknown_state_uses_status_message() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({ "status": "PASSWORD_EXPIRED" }))));
        let response = OktaStateHandler::InitialLogin.normalize(event);
        assert!(matches!(
            response,
            Err(AuthError::AuthFailed(ref message)) if message == "Password has expired."
        ));
    }

    #[test]
    fn enroll_during_login_needs_setup() {
        let event = OktaAuthEvent::from_outcome(Ok(result(json!({ "status": "MFA_ENROLL" }))));
        let response = OktaStateHandler::InitialLogin.normalize(event);
        assert!(matches!(response, Err(AuthError::MfaSetupRequired(_))));
    }

    #[test]
    fn login_failures() {
        let unauthorized = http_error(StatusCode::UNAUTHORIZED, "E0000004", "Authentication failed");
        assert!(matches!(
            OktaStateHandler::InitialLogin.normalize(unauthorized),
            Err(AuthError::LoginFailed(_))
        ));

        let mfa = http_error(StatusCode::BAD_REQUEST, "E0000001", "MFA enrollment required");
        assert!(matches!(
            OktaStateHandler::InitialLogin.normalize(mfa),
            Err(AuthError::MfaSetupRequired(_))
        ));

        let unavailable = http_error(StatusCode::BAD_GATEWAY, "E0000009", "Internal Server Error");
        assert!(matches!(
            OktaStateHandler::InitialLogin.normalize(unavailable),
            Err(AuthError::ServiceUnavailable(_))
        ));

        let transport = OktaAuthEvent::Failed(VendorError::Transport("refused".to_string()));
        assert!(matches!(
            OktaStateHandler::InitialLogin.normalize(transport),
            Err(AuthError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn factor_verify_failures() {
        let passcode = http_error(StatusCode::FORBIDDEN, ERROR_INVALID_PASSCODE, "Invalid Passcode/Answer");
        assert!(matches!(
            OktaStateHandler::FactorVerify.normalize(passcode),
            Err(AuthError::FactorValidation(_))
        ));

        let stale = http_error(StatusCode::FORBIDDEN, "E0000011", "Invalid token provided");
        assert!(matches!(
            OktaStateHandler::FactorVerify.normalize(stale),
            Err(AuthError::AuthFailed(_))
        ));

        let throttled = http_error(StatusCode::TOO_MANY_REQUESTS, "E0000047", "API call exceeded rate limit");
        assert!(matches!(
            OktaStateHandler::FactorVerify.normalize(throttled),
            Err(AuthError::ServiceUnavailable(_))
        ));
    }
}
