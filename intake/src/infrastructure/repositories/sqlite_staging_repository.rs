// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Staging Repository
//!
//! One physical table per entity type, all with the same shape. The table
//! name is resolved from `EntityKind`, never from caller input, so the
//! formatted queries stay injection-safe. `(import_package_id,
//! original_entity_id)` is unique per table; the loader relies on that to
//! surface double-staging as a database error instead of silent duplication.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use tenure_intake_domain::entities::staging::{EntityKind, StagingRow, ValidationStatus};
use tenure_intake_domain::repositories::StagingRepository;
use tenure_intake_domain::value_objects::Diagnostic;
use tenure_intake_domain::IntakeError;

pub struct SqliteStagingRepository {
    pool: SqlitePool,
}

impl SqliteStagingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_from_sql(kind: EntityKind, row: &SqliteRow) -> Result<StagingRow, IntakeError> {
        let db = |e: sqlx::Error| IntakeError::database(e.to_string());
        let id: String = row.try_get("id").map_err(db)?;
        let package: String = row.try_get("import_package_id").map_err(db)?;
        let original: String = row.try_get("original_entity_id").map_err(db)?;
        let payload: String = row.try_get("payload").map_err(db)?;
        let status: String = row.try_get("validation_status").map_err(db)?;
        let errors: String = row.try_get("validation_errors").map_err(db)?;
        let warnings: String = row.try_get("validation_warnings").map_err(db)?;
        let approved: i64 = row.try_get("is_approved_for_commit").map_err(db)?;
        let committed: Option<String> = row.try_get("committed_entity_id").map_err(db)?;

        let parse_uuid = |s: &str| {
            Uuid::from_str(s).map_err(|e| IntakeError::database(format!("uuid {:?}: {}", s, e)))
        };
        let errors: Vec<Diagnostic> = serde_json::from_str(&errors)?;
        let warnings: Vec<Diagnostic> = serde_json::from_str(&warnings)?;

        Ok(StagingRow {
            id: parse_uuid(&id)?,
            import_package_id: parse_uuid(&package)?,
            kind,
            original_entity_id: parse_uuid(&original)?,
            payload: serde_json::from_str(&payload)?,
            validation_status: ValidationStatus::from_str(&status)?,
            validation_errors: errors,
            validation_warnings: warnings,
            is_approved_for_commit: approved != 0,
            committed_entity_id: committed.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

#[async_trait]
impl StagingRepository for SqliteStagingRepository {
    async fn insert_rows(&self, rows: &[StagingRow]) -> Result<(), IntakeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        for row in rows {
            let query = format!(
                "INSERT INTO {} (id, import_package_id, original_entity_id, payload, \
                 validation_status, validation_errors, validation_warnings, \
                 is_approved_for_commit, committed_entity_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                row.kind.staging_table()
            );
            sqlx::query(&query)
                .bind(row.id.to_string())
                .bind(row.import_package_id.to_string())
                .bind(row.original_entity_id.to_string())
                .bind(serde_json::to_string(&row.payload)?)
                .bind(row.validation_status.as_str())
                .bind(serde_json::to_string(&row.validation_errors)?)
                .bind(serde_json::to_string(&row.validation_warnings)?)
                .bind(row.is_approved_for_commit as i64)
                .bind(row.committed_entity_id.map(|u| u.to_string()))
                .execute(&mut *tx)
                .await
                .map_err(|e| IntakeError::database(format!("{}: {}", row.kind.staging_table(), e)))?;
        }
        tx.commit().await.map_err(|e| IntakeError::database(e.to_string()))
    }

    async fn delete_for_package(&self, import_package_id: Uuid) -> Result<u64, IntakeError> {
        let mut removed = 0u64;
        for kind in EntityKind::DEPENDENCY_ORDER {
            let query = format!("DELETE FROM {} WHERE import_package_id = ?", kind.staging_table());
            let result = sqlx::query(&query)
                .bind(import_package_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| IntakeError::database(e.to_string()))?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    async fn rows_for_package(
        &self,
        import_package_id: Uuid,
        kind: EntityKind,
    ) -> Result<Vec<StagingRow>, IntakeError> {
        let query = format!(
            "SELECT * FROM {} WHERE import_package_id = ? ORDER BY original_entity_id",
            kind.staging_table()
        );
        let rows = sqlx::query(&query)
            .bind(import_package_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        rows.iter().map(|r| Self::row_from_sql(kind, r)).collect()
    }

    async fn find_row(
        &self,
        import_package_id: Uuid,
        kind: EntityKind,
        original_entity_id: Uuid,
    ) -> Result<Option<StagingRow>, IntakeError> {
        let query = format!(
            "SELECT * FROM {} WHERE import_package_id = ? AND original_entity_id = ?",
            kind.staging_table()
        );
        let row = sqlx::query(&query)
            .bind(import_package_id.to_string())
            .bind(original_entity_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        row.as_ref().map(|r| Self::row_from_sql(kind, r)).transpose()
    }

    async fn update_row(&self, row: &StagingRow) -> Result<(), IntakeError> {
        let query = format!(
            "UPDATE {} SET validation_status = ?, validation_errors = ?, \
             validation_warnings = ?, is_approved_for_commit = ?, committed_entity_id = ? \
             WHERE id = ?",
            row.kind.staging_table()
        );
        let result = sqlx::query(&query)
            .bind(row.validation_status.as_str())
            .bind(serde_json::to_string(&row.validation_errors)?)
            .bind(serde_json::to_string(&row.validation_warnings)?)
            .bind(row.is_approved_for_commit as i64)
            .bind(row.committed_entity_id.map(|u| u.to_string()))
            .bind(row.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(IntakeError::NotFound(format!("staging row {}", row.id)));
        }
        Ok(())
    }
}
