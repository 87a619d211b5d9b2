use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::ForeignKeyAction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use watchtower_common::WatchtowerError;

/// Duty status of a controller. The string values are the wire contract.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum ControllerStatus {
    #[sea_orm(string_value = "FERIE")]
    #[serde(rename = "FERIE")]
    OnVacation,
    #[sea_orm(string_value = "SYG")]
    #[serde(rename = "SYG")]
    Sick,
    #[sea_orm(string_value = "MOEDT")]
    #[serde(rename = "MOEDT")]
    OnDuty,
    #[sea_orm(string_value = "GAAET")]
    #[serde(rename = "GAAET")]
    OffDuty,
}

impl ControllerStatus {
    /// Board column order.
    pub const ALL: [ControllerStatus; 4] = [
        ControllerStatus::OnVacation,
        ControllerStatus::Sick,
        ControllerStatus::OnDuty,
        ControllerStatus::OffDuty,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::OnVacation => "FERIE",
            Self::Sick => "SYG",
            Self::OnDuty => "MOEDT",
            Self::OffDuty => "GAAET",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OnVacation => "Ferie",
            Self::Sick => "Syg",
            Self::OnDuty => "Mødt",
            Self::OffDuty => "Gået",
        }
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self::OffDuty
    }
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ControllerStatus {
    type Err = WatchtowerError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| WatchtowerError::InvalidStatus(code.to_owned()))
    }
}

/// A roster entry, one row on the board.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "controllers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Radio identifier, e.g. "01".
    #[sea_orm(unique)]
    pub callsign: String,
    pub name: String,
    pub note: String,
    pub is_active: bool,
    pub status: ControllerStatus,
    pub status_changed_at: Option<DateTime<Utc>>,
    /// Who made the last change; `None` for system changes or deleted users.
    pub status_changed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn display_name(&self) -> String {
        if self.note.is_empty() {
            format!("{} {}", self.callsign, self.name)
        } else {
            format!("{} {} {}", self.callsign, self.name, self.note)
        }
    }
}

impl Related<super::StatusLogEntry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusLog.def()
    }
}

impl Related<super::User::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChangedBy.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    StatusLog,
    ChangedBy,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::StatusLog => Entity::has_many(super::StatusLogEntry::Entity)
                .from(Column::Id)
                .to(super::StatusLogEntry::Column::ControllerId)
                .into(),
            Self::ChangedBy => Entity::belongs_to(super::User::Entity)
                .from(Column::StatusChangedBy)
                .to(super::User::Column::Id)
                .on_delete(ForeignKeyAction::SetNull)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_parse() {
        for status in ControllerStatus::ALL {
            assert_eq!(status.code().parse::<ControllerStatus>().unwrap(), status);
            assert_eq!(status.to_string(), status.code());
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        for code in ["", "moedt", "MØDT", "ON_DUTY", "UNKNOWN", " SYG"] {
            assert!(matches!(
                code.parse::<ControllerStatus>(),
                Err(WatchtowerError::InvalidStatus(c)) if c == code
            ));
        }
    }

    #[test]
    fn labels_and_default() {
        assert_eq!(ControllerStatus::OnDuty.label(), "Mødt");
        assert_eq!(ControllerStatus::OffDuty.label(), "Gået");
        assert_eq!(ControllerStatus::default(), ControllerStatus::OffDuty);
    }

    #[test]
    fn serializes_as_machine_code() {
        assert_eq!(
            serde_json::to_string(&ControllerStatus::OnVacation).unwrap(),
            "\"FERIE\""
        );
    }
}
