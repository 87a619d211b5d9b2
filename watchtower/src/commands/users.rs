use anyhow::Result;
use console::style;
use tracing::*;
use watchtower_core::Services;

use crate::commands::common::{confirm, format_time, open_services};

#[derive(clap::Subcommand)]
pub(crate) enum UsersCommand {
    /// Create a user
    Add { username: String },
    /// List all users
    List,
    /// Delete a user and their tokens
    Remove {
        username: String,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
}

pub(crate) async fn command(cli: &crate::Cli, command: &UsersCommand) -> Result<()> {
    let services = open_services(cli).await?;

    match command {
        UsersCommand::Add { username } => {
            let user = services.users.create_user(username).await?;
            println!("{}", user.id);
        }
        UsersCommand::List => list(&services).await?,
        UsersCommand::Remove { username, yes } => {
            let user = services.users.find_by_username(username).await?;
            let prompt = format!("Delete {} and all of their access tokens?", user.username);
            if !yes && !confirm(&prompt)? {
                info!("Aborted");
                return Ok(());
            }
            services.users.delete_user(user.id).await?;
        }
    }
    Ok(())
}

async fn list(services: &Services) -> Result<()> {
    let users = services.users.list_users().await?;
    println!(
        "{}",
        style(format!("{:<36}  {:<24}  {}", "ID", "USERNAME", "CREATED")).bold()
    );
    for user in users {
        println!(
            "{:<36}  {:<24}  {}",
            user.id,
            user.username,
            format_time(Some(user.created_at))
        );
    }
    Ok(())
}
