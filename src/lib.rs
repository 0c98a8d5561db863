//! # Cerberus (MFA Orchestration)
//!
//! `cerberus` drives a login attempt against an external identity provider
//! through its multi-factor stages and normalizes every vendor's answer into a
//! single [`auth::AuthResponse`] state machine.
//!
//! ## Login Flow
//!
//! 1. `authenticate` returns `SUCCESS` for accounts without MFA, or
//!    `MFA_REQUIRED` with a state token and the enrolled devices.
//! 2. Factors that deliver codes out-of-band (SMS, voice) are sent with
//!    `trigger_challenge`; push factors are approved with `trigger_push`,
//!    which polls the provider until the user responds.
//! 3. `mfa_check` submits a one-time code and returns `SUCCESS`.
//!
//! ## Providers
//!
//! - **Okta:** authn API responses are delivered as events on a spawned task
//!   and handed back to the caller through a bounded-wait completion bridge.
//! - **OneLogin:** session login tokens are plain request/response calls.
//!
//! Group membership for authorization is resolved per provider with
//! `get_groups` once the login succeeded.

pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
