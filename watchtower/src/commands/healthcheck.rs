use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::timeout;
use tracing::*;
use watchtower_core::db::connect_to_db;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config, true)?;

    let db = timeout(Duration::from_secs(10), connect_to_db(&config))
        .await
        .context("Timeout")?
        .context("Failed to open the database")?;

    timeout(Duration::from_secs(5), db.ping())
        .await
        .context("Timeout")?
        .context("Database did not respond")?;

    info!("Database is reachable and up to date");
    Ok(())
}
