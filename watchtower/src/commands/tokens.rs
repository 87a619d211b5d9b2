use std::io::{BufRead, IsTerminal};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use uuid::Uuid;
use watchtower_common::WatchtowerError;

use crate::commands::common::{format_time, open_services};

#[derive(clap::Subcommand)]
pub(crate) enum TokensCommand {
    /// Issue a token and print its secret. The secret cannot be shown again.
    Issue {
        username: String,
        label: String,
        /// Lifetime such as "24h" or "30d"; falls back to tokens.default_ttl
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
    },
    /// List a user's tokens
    List { username: String },
    /// Revoke a token
    Revoke { id: Uuid },
    /// Check a secret read from the terminal or stdin
    Verify,
}

pub(crate) async fn command(cli: &crate::Cli, command: &TokensCommand) -> Result<()> {
    let services = open_services(cli).await?;

    match command {
        TokensCommand::Issue {
            username,
            label,
            ttl,
        } => {
            let user = services.users.find_by_username(username).await?;
            let ttl = ttl
                .map(chrono::Duration::from_std)
                .transpose()
                .context("ttl is too large")?;
            let issued = services.tokens.issue(user.id, label, ttl).await?;

            eprintln!(
                "Token {} issued, expires {}. Store the secret now, it will not be shown again:",
                issued.token.id,
                format_time(issued.token.expires_at),
            );
            println!("{}", issued.secret.expose_secret());
        }
        TokensCommand::List { username } => {
            let user = services.users.find_by_username(username).await?;
            let tokens = services.tokens.list_tokens(user.id).await?;
            let now = services.clock.now();

            println!(
                "{}",
                style(format!(
                    "{:<36}  {:<20}  {:<8}  {:<19}  {}",
                    "ID", "LABEL", "STATE", "EXPIRES", "LAST USED"
                ))
                .bold()
            );
            for token in tokens {
                let state = if token.is_revoked() {
                    "revoked"
                } else if token.is_expired_at(now) {
                    "expired"
                } else {
                    "active"
                };
                println!(
                    "{:<36}  {:<20}  {:<8}  {:<19}  {}",
                    token.id,
                    token.label,
                    state,
                    format_time(token.expires_at),
                    format_time(token.last_used_at),
                );
            }
        }
        TokensCommand::Revoke { id } => {
            let token = services.tokens.revoke(*id).await?;
            println!("{} revoked at {}", token.id, format_time(token.revoked_at));
        }
        TokensCommand::Verify => {
            let secret = read_secret()?;
            match services.tokens.authenticate(secret.trim()).await {
                Ok(auth) => println!("{} ({})", auth.user.username, auth.token.label),
                Err(WatchtowerError::Unauthenticated) => {
                    println!("{}", WatchtowerError::Unauthenticated);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn read_secret() -> Result<String> {
    if std::io::stdin().is_terminal() {
        return Ok(dialoguer::Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Token")
            .interact()?);
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
