// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Import Package Repository
//!
//! Persists the `ImportPackage` aggregate as a JSON document alongside the
//! extracted columns queries need (`package_id` for idempotency, `status`
//! for dashboards). The unique index on `package_id` is what makes
//! duplicate receipt of the same archive a lookup rather than a race.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use tenure_intake_domain::entities::ImportPackage;
use tenure_intake_domain::repositories::ImportPackageRepository;
use tenure_intake_domain::IntakeError;

pub struct SqliteImportPackageRepository {
    pool: SqlitePool,
}

impl SqliteImportPackageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn deserialize(data: &str) -> Result<ImportPackage, IntakeError> {
        serde_json::from_str(data)
            .map_err(|e| IntakeError::SerializationError(format!("import package row: {}", e)))
    }
}

#[async_trait]
impl ImportPackageRepository for SqliteImportPackageRepository {
    async fn save(&self, package: &ImportPackage) -> Result<(), IntakeError> {
        let data = serde_json::to_string(package)?;
        let result = sqlx::query(
            "INSERT INTO import_packages (id, package_id, package_number, status, data, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(package.id().to_string())
        .bind(package.package_id().to_string())
        .bind(package.package_number().as_str())
        .bind(package.status().as_str())
        .bind(data)
        .bind(package.created_at().to_rfc3339())
        .bind(package.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                Err(IntakeError::DuplicateBusinessIdentifier(format!(
                    "package {} already received",
                    package.package_id()
                )))
            }
            Err(e) => Err(IntakeError::database(e.to_string())),
        }
    }

    async fn update(&self, package: &ImportPackage) -> Result<(), IntakeError> {
        let data = serde_json::to_string(package)?;
        let result = sqlx::query(
            "UPDATE import_packages SET status = ?, data = ?, updated_at = ? WHERE id = ?",
        )
        .bind(package.status().as_str())
        .bind(data)
        .bind(package.updated_at().to_rfc3339())
        .bind(package.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(IntakeError::NotFound(format!("import package {}", package.id())));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ImportPackage>, IntakeError> {
        let row = sqlx::query("SELECT data FROM import_packages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        row.map(|r| {
            let data: String = r.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
            Self::deserialize(&data)
        })
        .transpose()
    }

    async fn find_by_package_id(&self, package_id: Uuid) -> Result<Option<ImportPackage>, IntakeError> {
        let row = sqlx::query("SELECT data FROM import_packages WHERE package_id = ?")
            .bind(package_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        row.map(|r| {
            let data: String = r.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
            Self::deserialize(&data)
        })
        .transpose()
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<ImportPackage>, IntakeError> {
        let rows = sqlx::query(
            "SELECT data FROM import_packages ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;

        rows.into_iter()
            .map(|r| {
                let data: String =
                    r.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
                Self::deserialize(&data)
            })
            .collect()
    }
}
