use anyhow::Result;
use console::style;
use watchtower_db_entities::ControllerStatus;

use crate::commands::common::{actor_label, format_time, open_services, usernames};

fn styled_label(status: ControllerStatus) -> console::StyledObject<&'static str> {
    let label = style(status.label());
    match status {
        ControllerStatus::OnDuty => label.green(),
        ControllerStatus::Sick => label.red(),
        ControllerStatus::OnVacation => label.yellow(),
        ControllerStatus::OffDuty => label.dim(),
    }
}

pub(crate) async fn command(cli: &crate::Cli, json: bool) -> Result<()> {
    let services = open_services(cli).await?;
    let board = services.ledger.board_snapshot().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    let names = usernames(&services).await?;

    println!(
        "{}",
        style(format!(
            "{:<40}  {:<6}  {:<19}  {}",
            "CONTROLLER", "STATUS", "SINCE", "BY"
        ))
        .bold()
    );
    for row in board {
        let controller = &row.controller;
        println!(
            "{:<40}  {:<6}  {:<19}  {}",
            controller.display_name(),
            styled_label(controller.status),
            format_time(controller.status_changed_at),
            actor_label(&names, row.latest_entry.and_then(|e| e.changed_by)),
        );
    }
    Ok(())
}
