use anyhow::Result;
use tracing::*;
use watchtower_db_entities::ControllerStatus;

use crate::commands::common::open_services;

#[derive(clap::Subcommand)]
pub(crate) enum StatusCommand {
    /// Set a controller's status (FERIE, SYG, MOEDT or GAAET)
    Set {
        callsign: String,
        status: String,
        /// Username to attribute the change to
        #[arg(long)]
        by: Option<String>,
        /// Only apply if the controller currently has this status
        #[arg(long)]
        expect: Option<String>,
    },
}

pub(crate) async fn command(cli: &crate::Cli, command: &StatusCommand) -> Result<()> {
    let StatusCommand::Set {
        callsign,
        status,
        by,
        expect,
    } = command;

    let services = open_services(cli).await?;
    let controller = services.roster.find_by_callsign(callsign).await?;
    let actor = match by {
        Some(username) => Some(services.users.find_by_username(username).await?.id),
        None => None,
    };

    let change = match expect {
        Some(expected) => {
            let expected: ControllerStatus = expected.parse()?;
            services
                .ledger
                .apply_status_change_if(controller.id, expected, status, actor)
                .await?
        }
        None => {
            services
                .ledger
                .apply_status_change(controller.id, status, actor)
                .await?
        }
    };

    if change.is_noop() {
        info!(
            callsign = %change.controller.callsign,
            status = %change.controller.status,
            "Status unchanged"
        );
    }
    println!(
        "{}: {}",
        change.controller.display_name(),
        change.controller.status.label()
    );
    Ok(())
}
