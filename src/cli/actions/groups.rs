use crate::auth::{self, AuthConfig, AuthData, ProviderConfig};
use anyhow::{Context, Result};
use std::io::{self, Write};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub provider: ProviderConfig,
    pub config: AuthConfig,
    pub user_id: String,
    pub username: Option<String>,
}

/// Execute the groups action.
/// # Errors
/// Returns an error if the provider cannot resolve the user's groups.
pub async fn execute(args: Args) -> Result<()> {
    let provider = args.provider.provider();
    let connector = auth::connector(args.provider, args.config)?;

    let auth_data = AuthData::new(args.user_id, args.username.unwrap_or_default());
    let groups = connector
        .get_groups(&auth_data)
        .await
        .with_context(|| format!("failed to resolve groups from {provider}"))?;

    info!(user_id = %auth_data.user_id, count = groups.len(), "resolved groups");

    let mut stdout = io::stdout().lock();
    for group in groups {
        writeln!(stdout, "{group}")?;
    }

    Ok(())
}
