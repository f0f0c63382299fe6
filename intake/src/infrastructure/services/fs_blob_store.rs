// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Blob Store
//!
//! Content-addressed attachment storage under the blob root:
//! `blobs/ab/cd/<hash>` where `ab`/`cd` are the first two byte pairs of the
//! hex hash. A catalog table mirrors what is on disk so probes are a single
//! indexed lookup. Writes go to a temp file first and are renamed into
//! place - rename is atomic on one filesystem, which makes concurrent
//! identical writes converge on the same file instead of corrupting it.
//!
//! The store also owns container archival: a committed `.uhc` file moves to
//! `archives/YYYY/MM/<package_id>.uhc` under the archive root.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use tenure_intake_domain::services::ports::{BlobRef, BlobStore};
use tenure_intake_domain::value_objects::Sha256Checksum;
use tenure_intake_domain::IntakeError;

pub struct FsBlobStore {
    blob_root: PathBuf,
    archive_root: PathBuf,
    pool: SqlitePool,
}

impl FsBlobStore {
    pub fn new(blob_root: PathBuf, archive_root: PathBuf, pool: SqlitePool) -> Self {
        Self {
            blob_root,
            archive_root,
            pool,
        }
    }

    fn relative_blob_path(hash: &Sha256Checksum) -> String {
        let hex = hash.as_str();
        format!("{}/{}/{}", &hex[0..2], &hex[2..4], hex)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn probe_by_hash(&self, hash: &Sha256Checksum) -> Result<Option<BlobRef>, IntakeError> {
        let row = sqlx::query("SELECT relative_path, size_bytes FROM blob_catalog WHERE hash = ?")
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::blob_store(e.to_string()))?;
        row.map(|r| {
            let relative_path: String = r
                .try_get("relative_path")
                .map_err(|e| IntakeError::blob_store(e.to_string()))?;
            let size_bytes: i64 = r
                .try_get("size_bytes")
                .map_err(|e| IntakeError::blob_store(e.to_string()))?;
            Ok(BlobRef {
                hash: hash.clone(),
                relative_path,
                size_bytes: size_bytes.max(0) as u64,
            })
        })
        .transpose()
    }

    async fn put(&self, hash: &Sha256Checksum, content: &[u8]) -> Result<BlobRef, IntakeError> {
        let relative = Self::relative_blob_path(hash);
        let target = self.blob_root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IntakeError::blob_store(format!("mkdir {}: {}", parent.display(), e)))?;
        }

        // Temp-then-rename keeps a half-written blob from ever being visible
        // under its content address.
        let temp = target.with_extension("part");
        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| IntakeError::blob_store(format!("write {}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| IntakeError::blob_store(format!("rename {}: {}", target.display(), e)))?;

        sqlx::query(
            "INSERT OR IGNORE INTO blob_catalog (hash, relative_path, size_bytes, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(hash.as_str())
        .bind(&relative)
        .bind(content.len() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| IntakeError::blob_store(e.to_string()))?;

        debug!(hash = hash.as_str(), bytes = content.len(), "stored attachment blob");
        Ok(BlobRef {
            hash: hash.clone(),
            relative_path: relative,
            size_bytes: content.len() as u64,
        })
    }

    async fn archive_package(
        &self,
        current_path: &Path,
        package_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<String, IntakeError> {
        let relative = format!("{:04}/{:02}/{}.uhc", when.year(), when.month(), package_id);
        let target = self.archive_root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IntakeError::archive(format!("mkdir {}: {}", parent.display(), e)))?;
        }

        // Rename first; fall back to copy + remove when the spool directory
        // sits on a different filesystem.
        if tokio::fs::rename(current_path, &target).await.is_err() {
            tokio::fs::copy(current_path, &target)
                .await
                .map_err(|e| IntakeError::archive(format!("copy to {}: {}", target.display(), e)))?;
            tokio::fs::remove_file(current_path)
                .await
                .map_err(|e| IntakeError::archive(format!("remove spool: {}", e)))?;
        }
        debug!(package_id = %package_id, path = %target.display(), "archived container");
        Ok(relative)
    }
}
