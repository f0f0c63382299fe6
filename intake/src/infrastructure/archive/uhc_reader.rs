// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # `.uhc` Container Reader
//!
//! A `.uhc` container is a self-contained embedded-relational file (SQLite)
//! produced by a field-collection device. Required tables: `manifest`, the
//! ten entity tables, and `attachment_blobs`. Entity tables carry
//! `(id TEXT PRIMARY KEY, data TEXT)` where `data` is the JSON payload of
//! the record; `attachment_blobs` carries `(hash TEXT PRIMARY KEY,
//! content BLOB)`.
//!
//! The reader opens containers strictly read-only - an uploaded archive is
//! untrusted input and is never modified, even when quarantined. All
//! failures to open or to read the manifest map to `ManifestInvalid`;
//! failures on data tables map to `ArchiveError`.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use tenure_intake_domain::entities::EntityKind;
use tenure_intake_domain::services::content_hash::{CanonicalHasher, CONTENT_HASH_TABLES};
use tenure_intake_domain::value_objects::{PackageManifest, Sha256Checksum};
use tenure_intake_domain::IntakeError;

/// One entity row as it appears inside the archive.
#[derive(Debug, Clone)]
pub struct ArchiveRow {
    pub original_entity_id: Uuid,
    pub payload: serde_json::Value,
}

/// Read-only handle over one `.uhc` container.
pub struct UhcArchive {
    pool: SqlitePool,
    path: PathBuf,
}

impl UhcArchive {
    /// Opens a container read-only. The file is not validated beyond being
    /// an SQLite database; call [`UhcArchive::read_manifest`] next.
    pub async fn open(path: &Path) -> Result<Self, IntakeError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .immutable(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| IntakeError::ManifestInvalid(format!("cannot open container: {}", e)))?;
        Ok(UhcArchive {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and structurally validates the single manifest record.
    pub async fn read_manifest(&self) -> Result<PackageManifest, IntakeError> {
        let row = sqlx::query(
            "SELECT package_id, schema_version, created_utc, exported_date_utc, \
             exported_by_user_id, device_id, total_record_count, entity_counts, \
             total_attachment_size_bytes, vocabulary_versions, checksum, digital_signature \
             FROM manifest LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IntakeError::ManifestInvalid(format!("manifest table unreadable: {}", e)))?
        .ok_or_else(|| IntakeError::ManifestInvalid("manifest table is empty".to_string()))?;

        let package_id: String = row
            .try_get("package_id")
            .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?;
        let entity_counts_json: String = row
            .try_get("entity_counts")
            .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?;
        let vocabulary_versions_json: String = row
            .try_get("vocabulary_versions")
            .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?;

        let entity_counts: BTreeMap<String, u64> = serde_json::from_str(&entity_counts_json)
            .map_err(|e| IntakeError::ManifestInvalid(format!("entity counts: {}", e)))?;
        let vocabulary_versions: BTreeMap<String, String> =
            serde_json::from_str(&vocabulary_versions_json)
                .map_err(|e| IntakeError::ManifestInvalid(format!("vocabulary versions: {}", e)))?;

        let manifest = PackageManifest {
            package_id: Uuid::from_str(&package_id)
                .map_err(|e| IntakeError::ManifestInvalid(format!("package id: {}", e)))?,
            schema_version: row
                .try_get("schema_version")
                .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?,
            created_utc: parse_utc(&get_text(&row, "created_utc")?)?,
            exported_date_utc: parse_utc(&get_text(&row, "exported_date_utc")?)?,
            exported_by_user_id: Uuid::from_str(&get_text(&row, "exported_by_user_id")?)
                .map_err(|e| IntakeError::ManifestInvalid(format!("exporter user id: {}", e)))?,
            device_id: get_text(&row, "device_id")?,
            total_record_count: row
                .try_get::<i64, _>("total_record_count")
                .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?
                .max(0) as u64,
            entity_counts,
            total_attachment_size_bytes: row
                .try_get::<i64, _>("total_attachment_size_bytes")
                .map_err(|e| IntakeError::ManifestInvalid(e.to_string()))?
                .max(0) as u64,
            vocabulary_versions,
            checksum: row.try_get::<Option<String>, _>("checksum").unwrap_or(None).unwrap_or_default(),
            digital_signature: row
                .try_get::<Option<String>, _>("digital_signature")
                .unwrap_or(None)
                .filter(|s| !s.trim().is_empty()),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// All rows of one entity table, ordered by primary key.
    pub async fn entity_rows(&self, kind: EntityKind) -> Result<Vec<ArchiveRow>, IntakeError> {
        let query = format!("SELECT id, data FROM {} ORDER BY id", kind.archive_table());
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IntakeError::ArchiveError(format!("table {}: {}", kind.archive_table(), e)))?;

        rows.into_iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                let data: String = row
                    .try_get("data")
                    .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                Ok(ArchiveRow {
                    original_entity_id: Uuid::from_str(&id).map_err(|e| {
                        IntakeError::ArchiveError(format!("row id {:?} in {}: {}", id, kind, e))
                    })?,
                    payload: serde_json::from_str(&data).map_err(|e| {
                        IntakeError::ArchiveError(format!("row {} in {}: {}", id, kind, e))
                    })?,
                })
            })
            .collect()
    }

    /// Content of one attachment blob by its lowercase hex hash.
    pub async fn blob_content(&self, hash: &str) -> Result<Option<Vec<u8>>, IntakeError> {
        let row = sqlx::query("SELECT content FROM attachment_blobs WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::ArchiveError(format!("attachment_blobs: {}", e)))?;
        row.map(|r| {
            r.try_get::<Vec<u8>, _>("content")
                .map_err(|e| IntakeError::ArchiveError(e.to_string()))
        })
        .transpose()
    }

    /// Recomputes the canonical content checksum over all data tables
    /// (everything except the manifest), exactly as the exporter does.
    pub async fn compute_content_checksum(&self) -> Result<Sha256Checksum, IntakeError> {
        let mut hasher = CanonicalHasher::new();
        for table in CONTENT_HASH_TABLES {
            if table == "attachment_blobs" {
                let rows = sqlx::query("SELECT hash, content FROM attachment_blobs ORDER BY hash")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| IntakeError::ArchiveError(format!("{}: {}", table, e)))?;
                hasher.begin_table(table, rows.len() as u64);
                for row in rows {
                    let hash: String = row
                        .try_get("hash")
                        .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                    let content: Vec<u8> = row
                        .try_get("content")
                        .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                    hasher.blob_row(&hash, &content);
                }
            } else {
                let query = format!("SELECT id, data FROM {} ORDER BY id", table);
                let rows = sqlx::query(&query)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| IntakeError::ArchiveError(format!("{}: {}", table, e)))?;
                hasher.begin_table(table, rows.len() as u64);
                for row in rows {
                    let id: String = row
                        .try_get("id")
                        .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                    let data: String = row
                        .try_get("data")
                        .map_err(|e| IntakeError::ArchiveError(e.to_string()))?;
                    hasher.text_row(&id, &data);
                }
            }
        }
        Ok(hasher.finish())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn get_text(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, IntakeError> {
    row.try_get(column)
        .map_err(|e| IntakeError::ManifestInvalid(format!("{}: {}", column, e)))
}

fn parse_utc(text: &str) -> Result<chrono::DateTime<chrono::Utc>, IntakeError> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| IntakeError::ManifestInvalid(format!("timestamp {:?}: {}", text, e)))
}
