use std::time::Duration;

use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, TransactionTrait,
};
use tracing::*;
use watchtower_common::helpers::fs::secure_file;
use watchtower_common::WatchtowerConfig;
use watchtower_db_migrations::migrate_database;

/// SQLite busy/locked (including extended codes) and the SQLSTATEs for
/// serialization failures and deadlocks.
const CONTENTION_CODES: &[&str] = &["5", "261", "517", "6", "262", "40001", "40P01"];

/// `true` when a statement failed because another connection held the
/// write lock or won a serialization race. The operation can be re-run.
pub fn is_write_contention(err: &DbErr) -> bool {
    #[cfg(any(feature = "sqlite", feature = "postgres", feature = "mysql"))]
    {
        use sea_orm::RuntimeErr;

        if let DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) = err
        {
            return e
                .as_database_error()
                .and_then(|e| e.code())
                .is_some_and(|code| CONTENTION_CODES.contains(&code.as_ref()));
        }
    }
    #[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
    let _ = (err, CONTENTION_CODES);
    false
}

fn is_in_memory(url: &url::Url) -> bool {
    url.path() == ":memory:" || url.query_pairs().any(|(k, v)| k == "mode" && v == "memory")
}

pub async fn connect_to_db(config: &WatchtowerConfig) -> Result<DatabaseConnection> {
    let mut url = url::Url::parse(&config.store.database_url.expose_secret()[..])?;
    let mut opt;

    if url.scheme() == "sqlite" && is_in_memory(&url) {
        // every pooled connection would otherwise see its own empty database
        opt = ConnectOptions::new(url.to_string());
        opt.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);
    } else {
        if url.scheme() == "sqlite" {
            let path = url.path();
            let mut abs_path = config.paths_relative_to.clone();
            abs_path.push(path);
            abs_path.push("db.sqlite3");

            if let Some(parent) = abs_path.parent() {
                std::fs::create_dir_all(parent)?
            }

            url.set_path(
                abs_path
                    .to_str()
                    .ok_or_else(|| anyhow::anyhow!("Failed to convert database path to string"))?,
            );

            url.set_query(Some("mode=rwc"));

            let db = Database::connect(ConnectOptions::new(url.to_string())).await?;
            db.begin().await?.commit().await?;
            drop(db);

            secure_file(&abs_path)?;
        }

        opt = ConnectOptions::new(url.to_string());
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8))
            .sqlx_logging(true);
    }

    let connection = Database::connect(opt).await?;

    migrate_database(&connection).await?;
    debug!(backend = ?connection.get_database_backend(), "Database ready");
    Ok(connection)
}
