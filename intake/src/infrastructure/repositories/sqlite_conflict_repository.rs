// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Conflict Repository
//!
//! Conflict records live with their package; suppression markers outlive
//! packages so a keep-separate decision is not re-surfaced by every later
//! upload of the same pair. A suppression is keyed by the entity type, the
//! detection-key hash of the staging side, and the production candidate id;
//! any change to the identifying fields changes the key and re-enables
//! detection.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::{ConflictEntityType, ConflictResolution};
use tenure_intake_domain::repositories::ConflictRepository;
use tenure_intake_domain::value_objects::Sha256Checksum;
use tenure_intake_domain::IntakeError;

pub struct SqliteConflictRepository {
    pool: SqlitePool,
}

impl SqliteConflictRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn deserialize(data: &str) -> Result<ConflictResolution, IntakeError> {
        serde_json::from_str(data)
            .map_err(|e| IntakeError::SerializationError(format!("conflict row: {}", e)))
    }
}

#[async_trait]
impl ConflictRepository for SqliteConflictRepository {
    async fn insert(&self, conflict: &ConflictResolution) -> Result<(), IntakeError> {
        sqlx::query(
            "INSERT INTO conflict_resolutions \
             (id, import_package_id, entity_type, staging_original_id, decision, data, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(conflict.id().to_string())
        .bind(conflict.import_package_id().to_string())
        .bind(conflict.entity_type().to_string())
        .bind(conflict.staging_original_id().to_string())
        .bind(conflict.decision().as_str())
        .bind(serde_json::to_string(conflict)?)
        .bind(conflict.created_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, conflict: &ConflictResolution) -> Result<(), IntakeError> {
        let result = sqlx::query(
            "UPDATE conflict_resolutions SET decision = ?, data = ? WHERE id = ?",
        )
        .bind(conflict.decision().as_str())
        .bind(serde_json::to_string(conflict)?)
        .bind(conflict.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(IntakeError::NotFound(format!("conflict {}", conflict.id())));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ConflictResolution>, IntakeError> {
        let row = sqlx::query("SELECT data FROM conflict_resolutions WHERE id = ?")
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

    async fn list_for_package(
        &self,
        import_package_id: Uuid,
    ) -> Result<Vec<ConflictResolution>, IntakeError> {
        let rows = sqlx::query(
            "SELECT data FROM conflict_resolutions WHERE import_package_id = ? ORDER BY created_at",
        )
        .bind(import_package_id.to_string())
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

    async fn unresolved_count(&self, import_package_id: Uuid) -> Result<u64, IntakeError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conflict_resolutions \
             WHERE import_package_id = ? AND decision = 'unresolved'",
        )
        .bind(import_package_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn delete_for_package(&self, import_package_id: Uuid) -> Result<u64, IntakeError> {
        let result = sqlx::query("DELETE FROM conflict_resolutions WHERE import_package_id = ?")
            .bind(import_package_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn is_suppressed(
        &self,
        entity_type: ConflictEntityType,
        detection_key: &Sha256Checksum,
        production_id: Uuid,
    ) -> Result<bool, IntakeError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conflict_suppressions \
             WHERE entity_type = ? AND detection_key_hash = ? AND production_id = ?",
        )
        .bind(entity_type.to_string())
        .bind(detection_key.as_str())
        .bind(production_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        Ok(count > 0)
    }

    async fn record_suppression(
        &self,
        entity_type: ConflictEntityType,
        detection_key: &Sha256Checksum,
        production_id: Uuid,
    ) -> Result<(), IntakeError> {
        sqlx::query(
            "INSERT OR IGNORE INTO conflict_suppressions \
             (entity_type, detection_key_hash, production_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(entity_type.to_string())
        .bind(detection_key.as_str())
        .bind(production_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        Ok(())
    }
}
