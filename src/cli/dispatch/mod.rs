//! Map validated CLI matches to an [`Action`].

use crate::cli::actions::{groups, login, Action};
use crate::cli::commands::{auth, provider, ARG_USERNAME, ARG_USER_ID, CMD_GROUPS, CMD_LOGIN};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let provider_opts = provider::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    match matches.subcommand() {
        Some((CMD_LOGIN, sub_m)) => Ok(Action::Login(login::Args {
            provider: provider_opts.provider,
            config: auth_opts.config,
            username: sub_m
                .get_one::<String>(ARG_USERNAME)
                .cloned()
                .context("missing required argument: --username")?,
        })),
        Some((CMD_GROUPS, sub_m)) => Ok(Action::Groups(groups::Args {
            provider: provider_opts.provider,
            config: auth_opts.config,
            user_id: sub_m
                .get_one::<String>(ARG_USER_ID)
                .cloned()
                .context("missing required argument: --user-id")?,
            username: sub_m.get_one::<String>(ARG_USERNAME).cloned(),
        })),
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}
