pub mod auth;
pub mod logging;
pub mod provider;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_GROUPS: &str = "groups";

pub const ARG_USERNAME: &str = "username";
pub const ARG_USER_ID: &str = "user-id";

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Log in and walk through the MFA prompts, printing the final response as JSON")
        .long_about(
            "Log in and walk through the MFA prompts, printing the final response as JSON.\n\
             The password is read from CERBERUS_PASSWORD, a hidden terminal prompt,\n\
             or the first line of stdin when it is not a terminal.",
        )
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long(ARG_USERNAME)
                .help("Login name")
                .env("CERBERUS_USERNAME")
                .required(true),
        )
}

fn groups() -> Command {
    Command::new(CMD_GROUPS)
        .about("Print the group names of a user, one per line")
        .arg(
            Arg::new(ARG_USER_ID)
                .long(ARG_USER_ID)
                .help("Provider user id")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long(ARG_USERNAME)
                .help("Login name, for logging only"),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("cerberus")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(login())
        .subcommand(groups());

    let command = provider::with_args(command);
    let command = auth::with_args(command);
    logging::with_args(command)
}
