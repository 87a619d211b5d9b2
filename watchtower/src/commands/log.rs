use std::collections::HashMap;

use anyhow::Result;
use console::style;

use crate::commands::common::{actor_label, format_time, open_services, usernames};

pub(crate) async fn command(
    cli: &crate::Cli,
    limit: Option<u64>,
    callsign: Option<&str>,
    json: bool,
) -> Result<()> {
    let services = open_services(cli).await?;

    let entries = match callsign {
        Some(callsign) => {
            let controller = services.roster.find_by_callsign(callsign).await?;
            services
                .ledger
                .entries_for_controller(controller.id, limit)
                .await?
        }
        None => services.ledger.list_recent_entries(limit).await?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let names = usernames(&services).await?;
    let callsigns: HashMap<_, _> = services
        .roster
        .list_controllers(true)
        .await?
        .into_iter()
        .map(|c| (c.id, c.callsign))
        .collect();

    println!(
        "{}",
        style(format!(
            "{:<19}  {:<10}  {:<6}  {:<6}  {}",
            "TIME", "CALLSIGN", "FROM", "TO", "BY"
        ))
        .bold()
    );
    for entry in entries {
        println!(
            "{:<19}  {:<10}  {:<6}  {:<6}  {}",
            format_time(Some(entry.changed_at)),
            callsigns
                .get(&entry.controller_id)
                .map(String::as_str)
                .unwrap_or("?"),
            entry.old_status.code(),
            entry.new_status.code(),
            actor_label(&names, entry.changed_by),
        );
    }
    Ok(())
}
