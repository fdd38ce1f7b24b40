// src/common/database.rs
//! SQLite pool construction.
//!
//! SQLite runs every transaction SERIALIZABLE: a single writer holds the
//! database lock while readers keep seeing the last committed state (WAL).
//! Contending writers wait up to the busy timeout instead of failing.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (and creates, if needed) the database behind `database_url`.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database with the real schema applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    super::migrations::run_migrations(&pool).await.unwrap();
    pool
}

/// File-backed database opened through `connect`, so tests see the real
/// multi-connection pool. Files are removed on drop.
#[cfg(test)]
pub struct TempDatabase {
    pub pool: SqlitePool,
    path: PathBuf,
}

#[cfg(test)]
impl TempDatabase {
    pub async fn open() -> Self {
        let path = std::env::temp_dir().join(format!("whattodo-test-{}.db", uuid::Uuid::new_v4()));
        let pool = connect(&format!("sqlite://{}", path.display())).await.unwrap();
        super::migrations::run_migrations(&pool).await.unwrap();
        Self { pool, path }
    }
}

#[cfg(test)]
impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
