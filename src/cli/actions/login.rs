use crate::auth::{
    self, AuthConfig, AuthConnector, AuthMfaDevice, AuthResponse, AuthStatus, ProviderConfig,
};
use anyhow::{anyhow, bail, Context, Result};
use secrecy::SecretString;
use std::{
    env,
    io::{self, BufRead, IsTerminal, Write},
};
use tracing::{debug, info};

pub const ENV_PASSWORD: &str = "CERBERUS_PASSWORD";

/// Answer that approves with a push notification instead of a code.
const PUSH_ANSWER: &str = "push";

#[derive(Debug)]
pub struct Args {
    pub provider: ProviderConfig,
    pub config: AuthConfig,
    pub username: String,
}

/// Execute the login action.
/// # Errors
/// Returns an error if any login step fails or the terminal cannot be read.
pub async fn execute(args: Args) -> Result<()> {
    let connector = auth::connector(args.provider, args.config)?;

    let mut input = io::stdin().lock();
    let mut prompt = io::stderr();

    let password = match env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => SecretString::from(password),
        _ if io::stdin().is_terminal() => SecretString::from(
            dialoguer::Password::new()
                .with_prompt("Password")
                .interact()
                .context("failed to read the password")?,
        ),
        _ => SecretString::from(read_line(&mut input)?),
    };

    let response = login(
        connector.as_ref(),
        &args.username,
        &password,
        &mut input,
        &mut prompt,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// Drive a login to completion, prompting on `prompt` and reading answers
/// from `input`.
///
/// # Errors
/// Returns an error if the provider rejects a step or an answer is invalid.
pub async fn login<R, W>(
    connector: &dyn AuthConnector,
    username: &str,
    password: &SecretString,
    input: &mut R,
    prompt: &mut W,
) -> Result<AuthResponse>
where
    R: BufRead,
    W: Write,
{
    let provider = connector.provider();

    let response = connector
        .authenticate(username, password)
        .await
        .with_context(|| format!("{provider} login failed"))?;

    if response.status() != AuthStatus::MfaRequired {
        return Ok(response);
    }

    let state_token = response
        .data()
        .state_token
        .clone()
        .context("MFA required without a state token")?;

    let device = choose_device(&response.data().devices, input, prompt)?;
    debug!(device = %device.id, "selected MFA device");

    if device.requires_trigger {
        connector
            .trigger_challenge(&state_token, &device.id)
            .await
            .context("failed to send the verification code")?;
        writeln!(prompt, "A verification code was sent to {}.", device.name)?;
    }

    // Push only makes sense for factors that are not sent on demand.
    let push_allowed = !device.requires_trigger;
    if push_allowed {
        write!(
            prompt,
            "Enter the code from {} or \"{PUSH_ANSWER}\": ",
            device.name
        )?;
    } else {
        write!(prompt, "Enter the code from {}: ", device.name)?;
    }
    prompt.flush()?;

    let answer = read_line(input)?;

    let response = if push_allowed && answer.eq_ignore_ascii_case(PUSH_ANSWER) {
        writeln!(prompt, "Waiting for push approval...")?;
        connector
            .trigger_push(&state_token, &device.id)
            .await
            .context("push approval failed")?
    } else {
        connector
            .mfa_check(&state_token, &device.id, &answer)
            .await
            .context("code verification failed")?
    };

    info!(provider, status = response.status().as_str(), "login finished");

    Ok(response)
}

fn choose_device<R, W>(devices: &[AuthMfaDevice], input: &mut R, prompt: &mut W) -> Result<AuthMfaDevice>
where
    R: BufRead,
    W: Write,
{
    match devices {
        [] => bail!("no MFA device available"),
        [device] => return Ok(device.clone()),
        _ => {}
    }

    writeln!(prompt, "MFA devices:")?;
    for (index, device) in devices.iter().enumerate() {
        writeln!(prompt, "  {}) {}", index + 1, device.name)?;
    }
    write!(prompt, "Choose a device [1-{}]: ", devices.len())?;
    prompt.flush()?;

    let choice = read_line(input)?;
    let index = choice
        .parse::<usize>()
        .ok()
        .filter(|index| (1..=devices.len()).contains(index))
        .ok_or_else(|| anyhow!("invalid device choice: {choice}"))?;

    Ok(devices[index - 1].clone())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("unexpected end of input");
    }
    Ok(line.trim().to_string())
}
