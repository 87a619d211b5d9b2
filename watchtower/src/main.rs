mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commands::controllers::ControllersCommand;
use crate::commands::status::StatusCommand;
use crate::commands::tokens::TokensCommand;
use crate::commands::users::UsersCommand;
use crate::logging::init_logging;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, default_value = "/etc/watchtower.yaml", env = "WATCHTOWER_CONFIG")]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
pub(crate) enum Commands {
    /// Validate config file
    Check,
    /// Connect to the database and apply pending migrations
    Healthcheck,
    /// Manage users
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Manage the controller roster
    Controllers {
        #[command(subcommand)]
        command: ControllersCommand,
    },
    /// Change a controller's duty status
    Status {
        #[command(subcommand)]
        command: StatusCommand,
    },
    /// Show every active controller with their current status
    Board {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the status change log, newest first
    Log {
        /// Number of entries to show
        #[arg(long, short)]
        limit: Option<u64>,
        /// Only show entries for this controller
        #[arg(long)]
        callsign: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Manage API access tokens
    Tokens {
        #[command(subcommand)]
        command: TokensCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Healthcheck => crate::commands::healthcheck::command(&cli).await,
        Commands::Users { command } => crate::commands::users::command(&cli, command).await,
        Commands::Controllers { command } => {
            crate::commands::controllers::command(&cli, command).await
        }
        Commands::Status { command } => crate::commands::status::command(&cli, command).await,
        Commands::Board { json } => crate::commands::board::command(&cli, *json).await,
        Commands::Log {
            limit,
            callsign,
            json,
        } => crate::commands::log::command(&cli, *limit, callsign.as_deref(), *json).await,
        Commands::Tokens { command } => crate::commands::tokens::command(&cli, command).await,
    }
}
