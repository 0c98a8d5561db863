//! MFA factor catalogs and the device-selection rules shared by every
//! provider's response normalizer.

use crate::auth::{AuthError, AuthMfaDevice};

#[derive(Clone, Copy, Debug)]
pub struct FactorEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub requires_trigger: bool,
}

/// Immutable vendor factor-type lookup table.
#[derive(Clone, Copy, Debug)]
pub struct FactorCatalog {
    entries: &'static [FactorEntry],
}

/// Keys are `"{provider}-{factorType}"`, lowercased.
pub static OKTA_FACTORS: FactorCatalog = FactorCatalog {
    entries: &[
        FactorEntry {
            key: "google-token:software:totp",
            name: "Google Authenticator",
            requires_trigger: false,
        },
        FactorEntry {
            key: "okta-token:software:totp",
            name: "Okta Verify TOTP",
            requires_trigger: false,
        },
        FactorEntry {
            key: "okta-push",
            name: "Okta Verify Push",
            requires_trigger: false,
        },
        FactorEntry {
            key: "okta-sms",
            name: "Okta Text Message Code",
            requires_trigger: true,
        },
        FactorEntry {
            key: "okta-call",
            name: "Okta Voice Call",
            requires_trigger: true,
        },
        FactorEntry {
            key: "yubico-token:hardware",
            name: "YubiKey",
            requires_trigger: false,
        },
    ],
};

/// Keys are OneLogin `device_type` values. OneLogin delivers codes without an
/// explicit trigger, so nothing here requires one.
pub static ONELOGIN_FACTORS: FactorCatalog = FactorCatalog {
    entries: &[
        FactorEntry {
            key: "google authenticator",
            name: "Google Authenticator",
            requires_trigger: false,
        },
        FactorEntry {
            key: "onelogin protect",
            name: "OneLogin Protect",
            requires_trigger: false,
        },
        FactorEntry {
            key: "onelogin sms",
            name: "OneLogin SMS",
            requires_trigger: false,
        },
        FactorEntry {
            key: "onelogin voice",
            name: "OneLogin Voice",
            requires_trigger: false,
        },
        FactorEntry {
            key: "yubico yubikey",
            name: "Yubico YubiKey",
            requires_trigger: false,
        },
    ],
};

impl FactorCatalog {
    /// Case-insensitive lookup.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&'static FactorEntry> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key.trim()))
    }

    /// Friendly name and trigger requirement for a vendor factor key.
    /// Unknown keys render as the capitalized key and never require a trigger.
    #[must_use]
    pub fn derive_device_info(&self, key: &str) -> (String, bool) {
        self.lookup(key).map_or_else(
            || (capitalize(key), false),
            |entry| (entry.name.to_string(), entry.requires_trigger),
        )
    }
}

/// Upper-case the first character, leave the rest untouched.
#[must_use]
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A vendor factor that already passed the vendor's support filter.
#[derive(Clone, Debug)]
pub struct CandidateFactor {
    pub id: String,
    pub key: String,
    pub configured: bool,
}

/// Build the device list of an `MFA_REQUIRED` response.
///
/// # Errors
/// Returns `AuthError::MfaSetupRequired` when no factor is left or none of the
/// remaining factors is configured.
pub fn select_devices<I>(catalog: &FactorCatalog, factors: I) -> Result<Vec<AuthMfaDevice>, AuthError>
where
    I: IntoIterator<Item = CandidateFactor>,
{
    let factors: Vec<CandidateFactor> = factors.into_iter().collect();

    if factors.is_empty() {
        return Err(AuthError::MfaSetupRequired(
            "no supported MFA factor is enrolled for this account".to_string(),
        ));
    }

    let devices: Vec<AuthMfaDevice> = factors
        .into_iter()
        .filter(|factor| factor.configured)
        .map(|factor| {
            let (name, requires_trigger) = catalog.derive_device_info(&factor.key);
            AuthMfaDevice {
                id: factor.id,
                name,
                requires_trigger,
            }
        })
        .collect();

    if devices.is_empty() {
        return Err(AuthError::MfaSetupRequired(
            "enrolled MFA factors are not configured".to_string(),
        ));
    }

    Ok(devices)
}

const UNKNOWN_STATUS_MESSAGE: &str =
    "MFA is required. Please confirm that you are enrolled in a supported MFA device.";

static STATUS_MESSAGES: &[(&str, &str)] = &[
    (
        "UNAUTHENTICATED",
        "User is not authenticated. Please confirm credentials.",
    ),
    (
        "PASSWORD_WARN",
        "Password is about to expire and should be changed.",
    ),
    ("PASSWORD_EXPIRED", "Password has expired."),
    ("RECOVERY", "User has requested a recovery token."),
    (
        "RECOVERY_CHALLENGE",
        "User must verify factor-specific recovery challenge.",
    ),
    (
        "PASSWORD_RESET",
        "User successfully answered their recovery question and must set a new password.",
    ),
    ("LOCKED_OUT", "User account is locked out."),
    ("MFA_ENROLL", "User must select and enroll an available factor."),
    (
        "MFA_ENROLL_ACTIVATE",
        "User must activate the factor to complete enrollment.",
    ),
];

/// Human-readable message for a provider state this crate does not drive.
#[must_use]
pub fn status_message(status: &str) -> &'static str {
    STATUS_MESSAGES
        .iter()
        .find(|(key, _)| *key == status)
        .map_or(UNKNOWN_STATUS_MESSAGE, |(_, message)| message)
}
