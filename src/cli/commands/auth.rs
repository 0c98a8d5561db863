use crate::auth::{transport::RetryPolicy, AuthConfig};
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_RESPONSE_TIMEOUT: &str = "response-timeout-seconds";
pub const ARG_PUSH_POLL_INTERVAL: &str = "push-poll-interval-ms";
pub const ARG_PUSH_DEADLINE: &str = "push-deadline-seconds";
pub const ARG_RETRY_ATTEMPTS: &str = "retry-attempts";
pub const ARG_RETRY_BASE_DELAY: &str = "retry-base-delay-ms";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub config: AuthConfig,
}

impl Options {
    /// Parse timing and retry arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value is zero where a positive duration is needed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read = |id: &str| -> u64 { matches.get_one::<u64>(id).copied().unwrap_or_default() };

        let response_timeout = read(ARG_RESPONSE_TIMEOUT);
        if response_timeout == 0 {
            anyhow::bail!("--{ARG_RESPONSE_TIMEOUT} must be greater than zero");
        }

        let push_deadline = read(ARG_PUSH_DEADLINE);
        if push_deadline == 0 {
            anyhow::bail!("--{ARG_PUSH_DEADLINE} must be greater than zero");
        }

        let attempts = matches
            .get_one::<u32>(ARG_RETRY_ATTEMPTS)
            .copied()
            .unwrap_or(1);

        let config = AuthConfig::new()
            .with_response_timeout(Duration::from_secs(response_timeout))
            .with_push_poll_interval(Duration::from_millis(read(ARG_PUSH_POLL_INTERVAL)))
            .with_push_deadline(Duration::from_secs(push_deadline))
            .with_retry(RetryPolicy::new(
                attempts,
                Duration::from_millis(read(ARG_RETRY_BASE_DELAY)),
            ));

        Ok(Self { config })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RESPONSE_TIMEOUT)
                .long(ARG_RESPONSE_TIMEOUT)
                .help("Seconds to wait for an identity provider response")
                .env("CERBERUS_RESPONSE_TIMEOUT_SECONDS")
                .global(true)
                .default_value("45")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PUSH_POLL_INTERVAL)
                .long(ARG_PUSH_POLL_INTERVAL)
                .help("Delay between push approval polls in milliseconds")
                .env("CERBERUS_PUSH_POLL_INTERVAL_MS")
                .global(true)
                .default_value("100")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PUSH_DEADLINE)
                .long(ARG_PUSH_DEADLINE)
                .help("Give up on an unanswered push after this many seconds")
                .env("CERBERUS_PUSH_DEADLINE_SECONDS")
                .global(true)
                .default_value("120")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RETRY_ATTEMPTS)
                .long(ARG_RETRY_ATTEMPTS)
                .help("Attempts per provider request on 5xx or connection errors")
                .env("CERBERUS_RETRY_ATTEMPTS")
                .global(true)
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..=10)),
        )
        .arg(
            Arg::new(ARG_RETRY_BASE_DELAY)
                .long(ARG_RETRY_BASE_DELAY)
                .help("Initial retry backoff in milliseconds, doubled per attempt")
                .env("CERBERUS_RETRY_BASE_DELAY_MS")
                .global(true)
                .default_value("250")
                .value_parser(clap::value_parser!(u64)),
        )
}
