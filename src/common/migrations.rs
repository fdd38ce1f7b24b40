// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{debug, info, warn};

/// Run all database migrations
///
/// Every step is idempotent: tables are created when missing, columns that
/// older databases lack are added and backfilled.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Only drop tables if RESET_DB environment variable is set to "true"
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("RESET_DB=true - dropping all tables and recreating schema");
        drop_all_tables(pool).await?;
    }

    create_user_table(pool).await?;
    create_itinerary_tables(pool).await?;
    backfill_user_columns(pool).await?;
    backfill_itinerary_columns(pool).await?;
    create_indexes(pool).await?;

    info!("Database migration completed successfully");

    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Reverse dependency order
    for table in ["itinerary_ratings", "itineraries", "user"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn create_user_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            email TEXT,
            google_sub TEXT,
            display_name TEXT,
            bio TEXT,
            saved_itineraries TEXT NOT NULL DEFAULT '[]',
            completed_itineraries TEXT NOT NULL DEFAULT '[]',
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_itinerary_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS itineraries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            duration TEXT,
            price TEXT,
            authorid INTEGER REFERENCES user(id),
            authorname TEXT,
            rating REAL NOT NULL DEFAULT 0,
            rating_count INTEGER NOT NULL DEFAULT 0,
            total_rating REAL NOT NULL DEFAULT 0,
            destinations TEXT NOT NULL DEFAULT '[]',
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per (rater, itinerary); limits each user to a single rating.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS itinerary_ratings (
            user_id INTEGER NOT NULL REFERENCES user(id),
            itinerary_id INTEGER NOT NULL REFERENCES itineraries(id) ON DELETE CASCADE,
            stars REAL NOT NULL,
            rated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, itinerary_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

async fn add_missing_columns(
    pool: &SqlitePool,
    table: &str,
    columns: &[(&str, &str)],
) -> Result<(), sqlx::Error> {
    let existing = existing_columns(pool, table).await?;

    for (name, definition) in columns {
        if existing.iter().any(|c| c == name) {
            continue;
        }
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, name, definition))
            .execute(pool)
            .await?;
        info!(table = %table, column = %name, "Added missing column");
    }

    Ok(())
}

async fn backfill_user_columns(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    add_missing_columns(
        pool,
        "user",
        &[
            ("email", "TEXT"),
            ("google_sub", "TEXT"),
            ("display_name", "TEXT"),
            ("bio", "TEXT"),
            ("saved_itineraries", "TEXT DEFAULT '[]'"),
            ("completed_itineraries", "TEXT DEFAULT '[]'"),
        ],
    )
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE user SET
            saved_itineraries = COALESCE(saved_itineraries, '[]'),
            completed_itineraries = COALESCE(completed_itineraries, '[]'),
            email = LOWER(email)
        WHERE saved_itineraries IS NULL
           OR completed_itineraries IS NULL
           OR email <> LOWER(email)
        "#,
    )
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        debug!(rows = result.rows_affected(), "Backfilled user rows");
    }

    Ok(())
}

async fn backfill_itinerary_columns(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    add_missing_columns(
        pool,
        "itineraries",
        &[
            ("tags", "TEXT DEFAULT '[]'"),
            ("duration", "TEXT"),
            ("price", "TEXT"),
            ("authorid", "INTEGER"),
            ("authorname", "TEXT"),
            ("rating", "REAL DEFAULT 0"),
            ("rating_count", "INTEGER DEFAULT 0"),
            ("total_rating", "REAL DEFAULT 0"),
            ("destinations", "TEXT DEFAULT '[]'"),
        ],
    )
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE itineraries SET
            tags = COALESCE(tags, '[]'),
            destinations = COALESCE(destinations, '[]'),
            rating = COALESCE(rating, 0),
            rating_count = COALESCE(rating_count, 0),
            total_rating = COALESCE(total_rating, 0)
        WHERE tags IS NULL
           OR destinations IS NULL
           OR rating IS NULL
           OR rating_count IS NULL
           OR total_rating IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        debug!(rows = result.rows_affected(), "Backfilled itinerary rows");
    }

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_email ON user(email) WHERE email IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_google_sub ON user(google_sub) WHERE google_sub IS NOT NULL",
        "CREATE INDEX IF NOT EXISTS idx_itineraries_authorid ON itineraries(authorid)",
        "CREATE INDEX IF NOT EXISTS idx_itinerary_ratings_itinerary ON itinerary_ratings(itinerary_id)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::database::test_pool;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let columns = existing_columns(&pool, "user").await.unwrap();
        assert!(columns.iter().any(|c| c == "saved_itineraries"));
        assert!(columns.iter().any(|c| c == "google_sub"));
    }

    #[tokio::test]
    async fn test_legacy_tables_are_backfilled() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT UNIQUE NOT NULL, password TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE itineraries (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, description TEXT NOT NULL, duration TEXT, price TEXT, authorid INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO user (username, password) VALUES ('legacy', 'x')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO itineraries (title, description) VALUES ('Old', 'Row')")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();

        let (saved, completed): (String, String) = sqlx::query_as(
            "SELECT saved_itineraries, completed_itineraries FROM user WHERE username = 'legacy'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(saved, "[]");
        assert_eq!(completed, "[]");

        let (count, tags): (i64, String) =
            sqlx::query_as("SELECT rating_count, tags FROM itineraries WHERE title = 'Old'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);
        assert_eq!(tags, "[]");
    }
}
