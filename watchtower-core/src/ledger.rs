use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchtower_common::helpers::clock::Clock;
use watchtower_common::{LedgerConfig, WatchtowerError};
use watchtower_db_entities::{Controller, ControllerStatus, StatusLogEntry, User};

use crate::db::is_write_contention;

/// Pause before re-running a lost status change, scaled by the attempt number.
const RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(15);

/// Result of a status change request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// Controller state after the call.
    pub controller: Controller::Model,
    /// The audit entry written, `None` when the call was a no-op.
    pub entry: Option<StatusLogEntry::Model>,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.entry.is_none()
    }
}

/// One row of the board: a controller and who/when changed it last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    pub controller: Controller::Model,
    pub latest_entry: Option<StatusLogEntry::Model>,
}

enum Attempt {
    Done(StatusChange),
    /// Someone else changed the status between our read and our write.
    Lost,
}

/// Owns controller status and the append-only transition log.
pub struct StatusLedger {
    db: Arc<Mutex<DatabaseConnection>>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    #[cfg(test)]
    forced_losses: std::sync::atomic::AtomicU32,
}

impl StatusLedger {
    pub fn new(
        db: Arc<Mutex<DatabaseConnection>>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            db,
            clock,
            config,
            #[cfg(test)]
            forced_losses: Default::default(),
        }
    }

    /// Moves a controller to `status_code`, writing exactly one log entry for
    /// a real transition and nothing when the status is already current.
    ///
    /// A lost compare-and-swap is retried against the fresh status up to
    /// `conflict_retries` times before giving up with `Conflict`.
    pub async fn apply_status_change(
        &self,
        controller_id: Uuid,
        status_code: &str,
        actor: Option<Uuid>,
    ) -> Result<StatusChange, WatchtowerError> {
        let new_status: ControllerStatus = status_code.parse()?;
        let db = self.db.lock().await;

        for attempt in 0..=self.config.conflict_retries {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            match self
                .try_transition(&db, controller_id, None, new_status, actor)
                .await
            {
                Ok(Attempt::Done(change)) => return Ok(change),
                Ok(Attempt::Lost) => {
                    debug!(%controller_id, attempt, "Status changed underneath us, retrying");
                }
                Err(WatchtowerError::DatabaseError(error)) if is_write_contention(&error) => {
                    debug!(%controller_id, attempt, %error, "Database busy, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(%controller_id, %new_status, "Giving up on status change after repeated conflicts");
        Err(WatchtowerError::Conflict(format!(
            "status of controller {controller_id} keeps changing"
        )))
    }

    /// Like [`Self::apply_status_change`], but only succeeds if the controller
    /// is still in `expected`. Never retries.
    pub async fn apply_status_change_if(
        &self,
        controller_id: Uuid,
        expected: ControllerStatus,
        status_code: &str,
        actor: Option<Uuid>,
    ) -> Result<StatusChange, WatchtowerError> {
        let new_status: ControllerStatus = status_code.parse()?;
        let db = self.db.lock().await;

        match self
            .try_transition(&db, controller_id, Some(expected), new_status, actor)
            .await
        {
            Ok(Attempt::Done(change)) => Ok(change),
            Ok(Attempt::Lost) => Err(WatchtowerError::Conflict(format!(
                "controller {controller_id} is no longer {expected}"
            ))),
            Err(WatchtowerError::DatabaseError(error)) if is_write_contention(&error) => {
                debug!(%controller_id, %error, "Database busy");
                Err(WatchtowerError::Conflict(format!(
                    "controller {controller_id} is being changed concurrently"
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_transition(
        &self,
        db: &DatabaseConnection,
        controller_id: Uuid,
        expected: Option<ControllerStatus>,
        new_status: ControllerStatus,
        actor: Option<Uuid>,
    ) -> Result<Attempt, WatchtowerError> {
        let txn = db.begin().await?;

        let controller = Controller::Entity::find_by_id(controller_id)
            .one(&txn)
            .await?
            .ok_or(WatchtowerError::ControllerNotFound(controller_id))?;

        if let Some(actor) = actor {
            ensure_user_exists(&txn, actor).await?;
        }

        if controller.status == new_status {
            debug!(%controller_id, status = %new_status, "Status unchanged, nothing to log");
            txn.rollback().await?;
            return Ok(Attempt::Done(StatusChange {
                controller,
                entry: None,
            }));
        }

        if expected.is_some_and(|expected| expected != controller.status) {
            txn.rollback().await?;
            return Ok(Attempt::Lost);
        }

        let old_status = controller.status;
        let now = monotonic_now(self.clock.now(), controller.status_changed_at);

        #[cfg(test)]
        self.interfere(&txn, controller_id, old_status).await?;

        let result = Controller::Entity::update_many()
            .set(Controller::ActiveModel {
                status: Set(new_status),
                status_changed_at: Set(Some(now)),
                status_changed_by: Set(actor),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(Controller::Column::Id.eq(controller_id))
            .filter(Controller::Column::Status.eq(old_status))
            .exec(&txn)
            .await?;

        if result.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(Attempt::Lost);
        }

        let entry = StatusLogEntry::ActiveModel {
            id: NotSet,
            controller_id: Set(controller_id),
            changed_by: Set(actor),
            changed_at: Set(now),
            old_status: Set(old_status),
            new_status: Set(new_status),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            %controller_id,
            callsign = %controller.callsign,
            %old_status,
            %new_status,
            actor = ?actor,
            "Controller status changed"
        );

        // the stored timestamp may be truncated by the backend
        Ok(Attempt::Done(StatusChange {
            controller: Controller::Model {
                status: new_status,
                status_changed_at: Some(entry.changed_at),
                status_changed_by: actor,
                updated_at: entry.changed_at,
                ..controller
            },
            entry: Some(entry),
        }))
    }

    /// Makes the next `times` compare-and-swaps lose, as if another writer had
    /// changed the status between the read and the update.
    #[cfg(test)]
    pub(crate) fn force_lost_races(&self, times: u32) {
        self.forced_losses
            .store(times, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    async fn interfere(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        controller_id: Uuid,
        current: ControllerStatus,
    ) -> Result<(), WatchtowerError> {
        use std::sync::atomic::Ordering;

        if self
            .forced_losses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Ok(());
        }
        let other = ControllerStatus::ALL
            .into_iter()
            .find(|status| *status != current)
            .unwrap_or_default();
        Controller::Entity::update_many()
            .set(Controller::ActiveModel {
                status: Set(other),
                ..Default::default()
            })
            .filter(Controller::Column::Id.eq(controller_id))
            .exec(txn)
            .await?;
        Ok(())
    }

    /// Most recent transitions across all controllers, newest first.
    pub async fn list_recent_entries(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<StatusLogEntry::Model>, WatchtowerError> {
        let limit = self.config.clamp_limit(limit);
        if limit == 0 {
            return Ok(vec![]);
        }

        let db = self.db.lock().await;
        Ok(StatusLogEntry::Entity::find()
            .order_by_desc(StatusLogEntry::Column::ChangedAt)
            .order_by_desc(StatusLogEntry::Column::Id)
            .limit(limit)
            .all(&*db)
            .await?)
    }

    /// History of one controller, newest first.
    pub async fn entries_for_controller(
        &self,
        controller_id: Uuid,
        limit: Option<u64>,
    ) -> Result<Vec<StatusLogEntry::Model>, WatchtowerError> {
        let limit = self.config.clamp_limit(limit);
        let db = self.db.lock().await;

        if Controller::Entity::find_by_id(controller_id)
            .one(&*db)
            .await?
            .is_none()
        {
            return Err(WatchtowerError::ControllerNotFound(controller_id));
        }
        if limit == 0 {
            return Ok(vec![]);
        }

        Ok(StatusLogEntry::Entity::find()
            .filter(StatusLogEntry::Column::ControllerId.eq(controller_id))
            .order_by_desc(StatusLogEntry::Column::ChangedAt)
            .order_by_desc(StatusLogEntry::Column::Id)
            .limit(limit)
            .all(&*db)
            .await?)
    }

    /// Every active controller in callsign order with its latest log entry.
    /// Runs a fixed number of queries regardless of roster size.
    pub async fn board_snapshot(&self) -> Result<Vec<BoardRow>, WatchtowerError> {
        let db = self.db.lock().await;

        let controllers = Controller::Entity::find()
            .filter(Controller::Column::IsActive.eq(true))
            .order_by_asc(Controller::Column::Callsign)
            .all(&*db)
            .await?;

        if controllers.is_empty() {
            return Ok(vec![]);
        }

        let controller_ids: Vec<Uuid> = controllers.iter().map(|c| c.id).collect();

        let latest_ids: Vec<i32> = StatusLogEntry::Entity::find()
            .select_only()
            .column_as(StatusLogEntry::Column::Id.max(), "latest_id")
            .filter(StatusLogEntry::Column::ControllerId.is_in(controller_ids))
            .group_by(StatusLogEntry::Column::ControllerId)
            .into_tuple()
            .all(&*db)
            .await?;

        let mut latest: HashMap<Uuid, StatusLogEntry::Model> = if latest_ids.is_empty() {
            HashMap::new()
        } else {
            StatusLogEntry::Entity::find()
                .filter(StatusLogEntry::Column::Id.is_in(latest_ids))
                .all(&*db)
                .await?
                .into_iter()
                .map(|entry| (entry.controller_id, entry))
                .collect()
        };

        Ok(controllers
            .into_iter()
            .map(|controller| BoardRow {
                latest_entry: latest.remove(&controller.id),
                controller,
            })
            .collect())
    }
}

async fn ensure_user_exists<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<(), WatchtowerError> {
    if User::Entity::find_by_id(user_id).one(db).await?.is_none() {
        return Err(WatchtowerError::UserNotFound(user_id.to_string()));
    }
    Ok(())
}

/// Keeps log timestamps non-decreasing per controller even if the wall
/// clock steps backwards.
fn monotonic_now(now: DateTime<Utc>, last_change: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match last_change {
        Some(last) if last > now => last,
        _ => now,
    }
}
