//! Okta authn API payloads.

use serde::Deserialize;

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_MFA_REQUIRED: &str = "MFA_REQUIRED";
pub const STATUS_MFA_CHALLENGE: &str = "MFA_CHALLENGE";

pub const FACTOR_STATUS_ACTIVE: &str = "ACTIVE";

/// Okta error code for a rejected passcode.
pub const ERROR_INVALID_PASSCODE: &str = "E0000068";

/// Factor types this crate can drive.
pub const SUPPORTED_FACTOR_TYPES: &[&str] = &[
    "token:software:totp",
    "token:hardware",
    "token",
    "push",
    "sms",
    "call",
];

/// Body of every `/api/v1/authn` response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthnResult {
    pub status: String,
    #[serde(default)]
    pub state_token: Option<String>,
    #[serde(default)]
    pub factor_result: Option<String>,
    #[serde(rename = "_embedded", default)]
    pub embedded: AuthnEmbedded,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthnEmbedded {
    #[serde(default)]
    pub user: Option<AuthnUser>,
    #[serde(default)]
    pub factors: Vec<Factor>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthnUser {
    pub id: String,
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
    pub id: String,
    pub factor_type: String,
    pub provider: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Factor {
    /// Catalog key, e.g. `okta-push`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.provider, self.factor_type).to_lowercase()
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        SUPPORTED_FACTOR_TYPES
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(&self.factor_type))
    }

    /// Factors without a status are treated as configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.status
            .as_deref()
            .map_or(true, |status| status.eq_ignore_ascii_case(FACTOR_STATUS_ACTIVE))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Group {
    pub id: String,
    pub profile: GroupProfile,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GroupProfile {
    pub name: String,
}
