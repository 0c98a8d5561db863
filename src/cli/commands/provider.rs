use crate::auth::{okta::OktaConfig, onelogin::OneLoginConfig, Provider, ProviderConfig};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_PROVIDER: &str = "provider";
pub const ARG_OKTA_URL: &str = "okta-url";
pub const ARG_OKTA_API_KEY: &str = "okta-api-key";
pub const ARG_ONELOGIN_URL: &str = "onelogin-url";
pub const ARG_ONELOGIN_CLIENT_ID: &str = "onelogin-client-id";
pub const ARG_ONELOGIN_CLIENT_SECRET: &str = "onelogin-client-secret";
pub const ARG_ONELOGIN_SUBDOMAIN: &str = "onelogin-subdomain";

#[derive(Debug, Clone)]
pub struct Options {
    pub provider: ProviderConfig,
}

impl Options {
    /// Parse the identity provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an argument required by the selected provider is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        let provider = matches
            .get_one::<Provider>(ARG_PROVIDER)
            .copied()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_PROVIDER}"))?;

        let provider = match provider {
            Provider::Okta => ProviderConfig::Okta(OktaConfig::new(
                read_required(ARG_OKTA_URL)?,
                SecretString::from(read_required(ARG_OKTA_API_KEY)?),
            )),
            Provider::OneLogin => ProviderConfig::OneLogin(OneLoginConfig::new(
                read_required(ARG_ONELOGIN_URL)?,
                read_required(ARG_ONELOGIN_CLIENT_ID)?,
                SecretString::from(read_required(ARG_ONELOGIN_CLIENT_SECRET)?),
                read_required(ARG_ONELOGIN_SUBDOMAIN)?,
            )),
        };

        Ok(Self { provider })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command.arg(
        Arg::new(ARG_PROVIDER)
            .long(ARG_PROVIDER)
            .help("Identity provider: okta or onelogin")
            .env("CERBERUS_PROVIDER")
            .global(true)
            .default_value("okta")
            .value_parser(clap::value_parser!(Provider)),
    );

    let command = with_okta_args(command);
    with_onelogin_args(command)
}

fn with_okta_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OKTA_URL)
                .long(ARG_OKTA_URL)
                .help("Okta org URL, example: https://example.okta.com")
                .env("CERBERUS_OKTA_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_OKTA_API_KEY)
                .long(ARG_OKTA_API_KEY)
                .help("Okta API token, used to read group membership")
                .env("CERBERUS_OKTA_API_KEY")
                .hide_env_values(true)
                .global(true),
        )
}

fn with_onelogin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ONELOGIN_URL)
                .long(ARG_ONELOGIN_URL)
                .help("OneLogin API URL")
                .env("CERBERUS_ONELOGIN_URL")
                .global(true)
                .default_value("https://api.us.onelogin.com"),
        )
        .arg(
            Arg::new(ARG_ONELOGIN_CLIENT_ID)
                .long(ARG_ONELOGIN_CLIENT_ID)
                .help("OneLogin API client id")
                .env("CERBERUS_ONELOGIN_CLIENT_ID")
                .global(true),
        )
        .arg(
            Arg::new(ARG_ONELOGIN_CLIENT_SECRET)
                .long(ARG_ONELOGIN_CLIENT_SECRET)
                .help("OneLogin API client secret")
                .env("CERBERUS_ONELOGIN_CLIENT_SECRET")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_ONELOGIN_SUBDOMAIN)
                .long(ARG_ONELOGIN_SUBDOMAIN)
                .help("OneLogin tenant subdomain, as in <subdomain>.onelogin.com")
                .env("CERBERUS_ONELOGIN_SUBDOMAIN")
                .global(true),
        )
}
