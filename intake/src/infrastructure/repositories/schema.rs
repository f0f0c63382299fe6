// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by repository implementations.
//!
//! Applies migrations on start-up so integration tests and the service see
//! a consistent database.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Runs pending migrations against the provided SQLite pool.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring database schema is up to date");
    sqlx::migrate!("../migrations").run(pool).await?;
    info!("Database schema is up to date");
    Ok(())
}

/// Creates a new SQLite database file if it doesn't exist.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    }
    Ok(())
}

/// Creates the database when missing, connects, and migrates. The one call
/// application startup needs.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_initialize_database_creates_tables() {
        let temp = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite://{}", temp.path().to_str().unwrap());
        drop(temp);

        let pool = initialize_database(&db_url).await.unwrap();
        let count: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='import_packages'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "import_packages table should exist");
    }

    #[tokio::test]
    async fn test_ensure_schema_idempotent() {
        let temp = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite://{}", temp.path().to_str().unwrap());
        drop(temp);

        let pool = initialize_database(&db_url).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }
}
