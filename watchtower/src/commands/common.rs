use std::collections::HashMap;
use std::io::IsTerminal;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use dialoguer::theme::ColorfulTheme;
use tracing::*;
use uuid::Uuid;
use watchtower_core::Services;

use crate::config::load_config;

pub(crate) async fn open_services(cli: &crate::Cli) -> Result<Services> {
    let config = load_config(&cli.config, true)?;
    Services::new(config).await
}

pub(crate) fn assert_interactive_terminal() {
    if !std::io::stdin().is_terminal() {
        error!("Please run this command from an interactive terminal.");
        std::process::exit(1);
    }
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    assert_interactive_terminal();
    Ok(dialoguer::Confirm::with_theme(&ColorfulTheme::default())
        .default(false)
        .with_prompt(prompt)
        .interact()?)
}

/// Usernames keyed by id, for rendering attribution columns.
pub(crate) async fn usernames(services: &Services) -> Result<HashMap<Uuid, String>> {
    Ok(services
        .users
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

pub(crate) fn actor_label(names: &HashMap<Uuid, String>, actor: Option<Uuid>) -> String {
    match actor {
        Some(id) => names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
        None => "-".into(),
    }
}

pub(crate) fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%d.%m.%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_missing_actors() {
        let id = Uuid::new_v4();
        let names = HashMap::from([(id, "alice".to_string())]);
        assert_eq!(actor_label(&names, Some(id)), "alice");
        assert_eq!(actor_label(&names, None), "-");

        let gone = Uuid::new_v4();
        assert_eq!(actor_label(&names, Some(gone)), gone.to_string());
        assert_eq!(format_time(None), "-");
    }
}
