use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;
use watchtower_common::helpers::clock::Clock;
use watchtower_common::{is_unique_violation, WatchtowerError};
use watchtower_db_entities::{Controller, ControllerStatus, StatusLogEntry};

const MAX_CALLSIGN_LEN: usize = 10;
const MAX_NAME_LEN: usize = 120;
const MAX_NOTE_LEN: usize = 50;

#[derive(Clone, Debug, Default)]
pub struct NewController {
    pub callsign: String,
    pub name: String,
    pub note: String,
}

/// Fields left as `None` are not touched.
#[derive(Clone, Debug, Default)]
pub struct ControllerUpdate {
    pub callsign: Option<String>,
    pub name: Option<String>,
    pub note: Option<String>,
    pub is_active: Option<bool>,
}

fn required(field: &str, value: &str, max_len: usize) -> Result<String, WatchtowerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WatchtowerError::invalid_argument(format!("{field} is required")));
    }
    optional(field, value, max_len)
}

fn optional(field: &str, value: &str, max_len: usize) -> Result<String, WatchtowerError> {
    let value = value.trim();
    if value.chars().count() > max_len {
        return Err(WatchtowerError::invalid_argument(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_owned())
}

fn callsign_taken(callsign: &str) -> WatchtowerError {
    WatchtowerError::Conflict(format!("callsign {callsign:?} already exists"))
}

/// Administrative maintenance of controller records. Status fields are
/// owned by the ledger and never written here.
pub struct Roster {
    db: Arc<Mutex<DatabaseConnection>>,
    clock: Arc<dyn Clock>,
}

impl Roster {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create_controller(
        &self,
        new: NewController,
    ) -> Result<Controller::Model, WatchtowerError> {
        let callsign = required("callsign", &new.callsign, MAX_CALLSIGN_LEN)?;
        let name = required("name", &new.name, MAX_NAME_LEN)?;
        let note = optional("note", &new.note, MAX_NOTE_LEN)?;

        let db = self.db.lock().await;
        if Controller::Entity::find()
            .filter(Controller::Column::Callsign.eq(&callsign))
            .one(&*db)
            .await?
            .is_some()
        {
            return Err(callsign_taken(&callsign));
        }

        let now = self.clock.now();
        let controller = Controller::ActiveModel {
            id: Set(Uuid::new_v4()),
            callsign: Set(callsign.clone()),
            name: Set(name),
            note: Set(note),
            is_active: Set(true),
            status: Set(ControllerStatus::default()),
            status_changed_at: Set(None),
            status_changed_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                callsign_taken(&callsign)
            } else {
                e.into()
            }
        })?;

        info!(controller_id = %controller.id, callsign = %controller.callsign, "Controller added");
        Ok(controller)
    }

    pub async fn update_controller(
        &self,
        id: Uuid,
        update: ControllerUpdate,
    ) -> Result<Controller::Model, WatchtowerError> {
        let db = self.db.lock().await;
        let Some(existing) = Controller::Entity::find_by_id(id).one(&*db).await? else {
            return Err(WatchtowerError::ControllerNotFound(id));
        };

        let mut model: Controller::ActiveModel = existing.into();

        if let Some(callsign) = update.callsign {
            let callsign = required("callsign", &callsign, MAX_CALLSIGN_LEN)?;
            if Controller::Entity::find()
                .filter(Controller::Column::Callsign.eq(&callsign))
                .filter(Controller::Column::Id.ne(id))
                .one(&*db)
                .await?
                .is_some()
            {
                return Err(callsign_taken(&callsign));
            }
            model.callsign = Set(callsign);
        }
        if let Some(name) = update.name {
            model.name = Set(required("name", &name, MAX_NAME_LEN)?);
        }
        if let Some(note) = update.note {
            model.note = Set(optional("note", &note, MAX_NOTE_LEN)?);
        }
        if let Some(is_active) = update.is_active {
            model.is_active = Set(is_active);
        }
        model.updated_at = Set(self.clock.now());

        let controller = model.update(&*db).await.map_err(|e| {
            if is_unique_violation(&e) {
                WatchtowerError::Conflict("callsign already exists".into())
            } else {
                e.into()
            }
        })?;
        info!(
            controller_id = %controller.id,
            callsign = %controller.callsign,
            "Controller updated"
        );
        Ok(controller)
    }

    /// Removes a controller together with its history.
    pub async fn delete_controller(&self, id: Uuid) -> Result<(), WatchtowerError> {
        let db = self.db.lock().await;
        let txn = db.begin().await?;

        let Some(controller) = Controller::Entity::find_by_id(id).one(&txn).await? else {
            return Err(WatchtowerError::ControllerNotFound(id));
        };

        let removed = StatusLogEntry::Entity::delete_many()
            .filter(StatusLogEntry::Column::ControllerId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        Controller::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(
            controller_id = %id,
            callsign = %controller.callsign,
            log_entries = removed,
            "Controller deleted"
        );
        Ok(())
    }

    pub async fn get_controller(&self, id: Uuid) -> Result<Controller::Model, WatchtowerError> {
        let db = self.db.lock().await;
        Controller::Entity::find_by_id(id)
            .one(&*db)
            .await?
            .ok_or(WatchtowerError::ControllerNotFound(id))
    }

    pub async fn find_by_callsign(
        &self,
        callsign: &str,
    ) -> Result<Controller::Model, WatchtowerError> {
        let db = self.db.lock().await;
        Controller::Entity::find()
            .filter(Controller::Column::Callsign.eq(callsign.trim()))
            .one(&*db)
            .await?
            .ok_or_else(|| WatchtowerError::CallsignNotFound(callsign.to_owned()))
    }

    pub async fn list_controllers(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Controller::Model>, WatchtowerError> {
        let db = self.db.lock().await;
        let mut query = Controller::Entity::find();
        if !include_inactive {
            query = query.filter(Controller::Column::IsActive.eq(true));
        }
        Ok(query
            .order_by_asc(Controller::Column::Callsign)
            .all(&*db)
            .await?)
    }
}
