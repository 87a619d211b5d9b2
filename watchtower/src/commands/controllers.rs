use anyhow::Result;
use console::style;
use tracing::*;
use watchtower_core::{ControllerUpdate, NewController, Services};

use crate::commands::common::{confirm, format_time, open_services};

#[derive(clap::Subcommand)]
pub(crate) enum ControllersCommand {
    /// Add a controller to the roster
    Add {
        callsign: String,
        name: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// List controllers
    List {
        /// Include deactivated controllers
        #[arg(long, short)]
        all: bool,
    },
    /// Change a controller's details
    Edit {
        callsign: String,
        #[arg(long)]
        new_callsign: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,
        #[arg(long)]
        deactivate: bool,
    },
    /// Delete a controller and their status history
    Remove {
        callsign: String,
        #[arg(long, short)]
        yes: bool,
    },
}

pub(crate) async fn command(cli: &crate::Cli, command: &ControllersCommand) -> Result<()> {
    let services = open_services(cli).await?;

    match command {
        ControllersCommand::Add {
            callsign,
            name,
            note,
        } => {
            let controller = services
                .roster
                .create_controller(NewController {
                    callsign: callsign.clone(),
                    name: name.clone(),
                    note: note.clone(),
                })
                .await?;
            println!("{}", controller.id);
        }
        ControllersCommand::List { all } => list(&services, *all).await?,
        ControllersCommand::Edit {
            callsign,
            new_callsign,
            name,
            note,
            activate,
            deactivate,
        } => {
            let controller = services.roster.find_by_callsign(callsign).await?;
            let is_active = match (activate, deactivate) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            services
                .roster
                .update_controller(
                    controller.id,
                    ControllerUpdate {
                        callsign: new_callsign.clone(),
                        name: name.clone(),
                        note: note.clone(),
                        is_active,
                    },
                )
                .await?;
        }
        ControllersCommand::Remove { callsign, yes } => {
            let controller = services.roster.find_by_callsign(callsign).await?;
            let prompt = format!(
                "Delete {} and their entire status history?",
                controller.display_name()
            );
            if !yes && !confirm(&prompt)? {
                info!("Aborted");
                return Ok(());
            }
            services.roster.delete_controller(controller.id).await?;
        }
    }
    Ok(())
}

async fn list(services: &Services, include_inactive: bool) -> Result<()> {
    let controllers = services.roster.list_controllers(include_inactive).await?;
    println!(
        "{}",
        style(format!(
            "{:<10}  {:<30}  {:<8}  {:<6}  {}",
            "CALLSIGN", "NAME", "ACTIVE", "STATUS", "CHANGED"
        ))
        .bold()
    );
    for controller in controllers {
        println!(
            "{:<10}  {:<30}  {:<8}  {:<6}  {}",
            controller.callsign,
            controller.name,
            if controller.is_active { "yes" } else { "no" },
            controller.status.code(),
            format_time(controller.status_changed_at),
        );
    }
    Ok(())
}
