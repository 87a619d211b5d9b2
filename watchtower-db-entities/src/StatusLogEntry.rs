use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::ForeignKeyAction;
use serde::Serialize;
use uuid::Uuid;

use crate::ControllerStatus;

/// Immutable record of one status transition.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "status_log")]
pub struct Model {
    /// Insertion order; breaks ties between equal timestamps.
    #[sea_orm(primary_key)]
    pub id: i32,
    pub controller_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub old_status: ControllerStatus,
    pub new_status: ControllerStatus,
}

impl Related<super::Controller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Controller.def()
    }
}

impl Related<super::User::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChangedBy.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Controller,
    ChangedBy,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Controller => Entity::belongs_to(super::Controller::Entity)
                .from(Column::ControllerId)
                .to(super::Controller::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Self::ChangedBy => Entity::belongs_to(super::User::Entity)
                .from(Column::ChangedBy)
                .to(super::User::Column::Id)
                .on_delete(ForeignKeyAction::SetNull)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
