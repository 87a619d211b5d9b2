use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use watchtower_common::helpers::clock::{Clock, SystemClock};
use watchtower_common::WatchtowerConfig;

use crate::db::connect_to_db;
use crate::{Roster, StatusLedger, TokenAuthority, Users};

#[derive(Clone)]
pub struct Services {
    pub db: Arc<Mutex<DatabaseConnection>>,
    pub config: Arc<WatchtowerConfig>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<StatusLedger>,
    pub tokens: Arc<TokenAuthority>,
    pub roster: Arc<Roster>,
    pub users: Arc<Users>,
}

impl Services {
    pub async fn new(config: WatchtowerConfig) -> Result<Self> {
        let db = connect_to_db(&config).await?;
        Ok(Self::from_connection(db, config, Arc::new(SystemClock)))
    }

    /// Wires the services around an already migrated connection.
    pub fn from_connection(
        db: DatabaseConnection,
        config: WatchtowerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let db = Arc::new(Mutex::new(db));

        let ledger = Arc::new(StatusLedger::new(
            db.clone(),
            clock.clone(),
            config.store.ledger.clone(),
        ));
        let tokens = Arc::new(TokenAuthority::new(
            db.clone(),
            clock.clone(),
            config.store.tokens.clone(),
        ));
        let roster = Arc::new(Roster::new(db.clone(), clock.clone()));
        let users = Arc::new(Users::new(db.clone(), clock.clone()));

        Self {
            db,
            config: Arc::new(config),
            clock,
            ledger,
            tokens,
            roster,
            users,
        }
    }
}
