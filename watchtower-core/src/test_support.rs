use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use watchtower_common::helpers::clock::ManualClock;
use watchtower_common::{Secret, WatchtowerConfig, WatchtowerConfigStore};
use watchtower_db_entities::{Controller, User};

use crate::db::connect_to_db;
use crate::{NewController, Services};

pub(crate) struct TestBed {
    pub services: Services,
    pub clock: ManualClock,
}

impl TestBed {
    pub async fn user(&self, username: &str) -> User::Model {
        self.services.users.create_user(username).await.unwrap()
    }

    pub async fn controller(&self, callsign: &str, name: &str) -> Controller::Model {
        self.services
            .roster
            .create_controller(NewController {
                callsign: callsign.into(),
                name: name.into(),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}

pub(crate) async fn fixture() -> TestBed {
    fixture_with(|_| {}).await
}

/// A migrated in-memory database behind a clock parked at 06:00 UTC.
pub(crate) async fn fixture_with(tweak: impl FnOnce(&mut WatchtowerConfig)) -> TestBed {
    let mut config = WatchtowerConfig {
        store: WatchtowerConfigStore {
            database_url: Secret::new("sqlite::memory:".into()),
            ..Default::default()
        },
        paths_relative_to: PathBuf::from("."),
    };
    tweak(&mut config);

    let db = connect_to_db(&config).await.unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
    let services = Services::from_connection(db, config, Arc::new(clock.clone()));
    TestBed { services, clock }
}

/// A fresh directory under the system temp dir.
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("watchtower-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Services over a sqlite file under `dir`, with their own connection pool.
/// Calling this twice with the same `dir` behaves like two processes
/// sharing one database.
pub(crate) async fn file_backed(dir: &Path, clock: &ManualClock) -> Services {
    let config = WatchtowerConfig {
        store: WatchtowerConfigStore {
            database_url: Secret::new("sqlite:data".into()),
            ..Default::default()
        },
        paths_relative_to: dir.to_path_buf(),
    };
    let db = connect_to_db(&config).await.unwrap();
    Services::from_connection(db, config, Arc::new(clock.clone()))
}
