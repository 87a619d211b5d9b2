use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;
use watchtower_common::helpers::clock::Clock;
use watchtower_common::{is_unique_violation, WatchtowerError};
use watchtower_db_entities::{AccessToken, Controller, StatusLogEntry, User};

/// Identity records for actors and token owners.
pub struct Users {
    db: Arc<Mutex<DatabaseConnection>>,
    clock: Arc<dyn Clock>,
}

impl Users {
    pub fn new(db: Arc<Mutex<DatabaseConnection>>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create_user(&self, username: &str) -> Result<User::Model, WatchtowerError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(WatchtowerError::invalid_argument("username is required"));
        }

        let db = self.db.lock().await;
        let user = User::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_owned()),
            created_at: Set(self.clock.now()),
        }
        .insert(&*db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                WatchtowerError::Conflict(format!("user {username:?} already exists"))
            } else {
                e.into()
            }
        })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User::Model, WatchtowerError> {
        let db = self.db.lock().await;
        User::Entity::find_by_id(id)
            .one(&*db)
            .await?
            .ok_or_else(|| WatchtowerError::UserNotFound(id.to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User::Model, WatchtowerError> {
        let db = self.db.lock().await;
        User::Entity::find()
            .filter(User::Column::Username.eq(username.trim()))
            .one(&*db)
            .await?
            .ok_or_else(|| WatchtowerError::UserNotFound(username.to_owned()))
    }

    pub async fn list_users(&self) -> Result<Vec<User::Model>, WatchtowerError> {
        let db = self.db.lock().await;
        Ok(User::Entity::find()
            .order_by_asc(User::Column::Username)
            .all(&*db)
            .await?)
    }

    /// Deletes a user and their tokens. Log entries and controllers they
    /// touched stay, with the attribution cleared.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), WatchtowerError> {
        let db = self.db.lock().await;
        let txn = db.begin().await?;

        if User::Entity::find_by_id(id).one(&txn).await?.is_none() {
            return Err(WatchtowerError::UserNotFound(id.to_string()));
        }

        StatusLogEntry::Entity::update_many()
            .col_expr(StatusLogEntry::Column::ChangedBy, Expr::value(None::<Uuid>))
            .filter(StatusLogEntry::Column::ChangedBy.eq(id))
            .exec(&txn)
            .await?;
        Controller::Entity::update_many()
            .col_expr(Controller::Column::StatusChangedBy, Expr::value(None::<Uuid>))
            .filter(Controller::Column::StatusChangedBy.eq(id))
            .exec(&txn)
            .await?;
        let tokens = AccessToken::Entity::delete_many()
            .filter(AccessToken::Column::UserId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        User::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(user_id = %id, tokens_removed = tokens, "User deleted");
        Ok(())
    }
}
