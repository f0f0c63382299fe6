// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Receive Package Use Case
//!
//! The upload entry point. Spools the stream to a per-run temp file, reads
//! the manifest, enforces idempotency by manifest package id, recomputes
//! the content checksum, verifies the signature under the server policy,
//! compares vocabulary versions, and persists the `ImportPackage` either
//! `Pending` or `Quarantined`.
//!
//! Integrity and compatibility faults are captured on the package and
//! returned in the result - they are never thrown past this use case. Only
//! transport faults, unreadable containers, and infrastructure errors
//! propagate; on those paths the spool file is cleaned up best-effort.
//! Quarantined containers are retained for forensic inspection.

use bytes::Bytes;
use chrono::Datelike;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use tenure_intake_domain::entities::{ImportPackage, ImportPackageSeed};
use tenure_intake_domain::services::ports::AuditEntry;
use tenure_intake_domain::value_objects::{Sha256Checksum, VocabularyCompatibility};
use tenure_intake_domain::IntakeError;

use crate::application::commands::{ReceivePackageCommand, UploadResult};
use crate::application::services::intake_service::IntakeDeps;
use crate::infrastructure::archive::uhc_reader::UhcArchive;

/// Spool buffer size for streaming uploads to disk.
const SPOOL_BUFFER_BYTES: usize = 256 * 1024;

pub struct ReceivePackageUseCase {
    deps: Arc<IntakeDeps>,
}

impl ReceivePackageUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute<S>(
        &self,
        command: ReceivePackageCommand,
        source: S,
    ) -> Result<UploadResult, IntakeError>
    where
        S: Stream<Item = Result<Bytes, IntakeError>> + Unpin + Send,
    {
        let user_id = command
            .user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("upload requires a user".to_string()))?;

        let spool_path = self.spool(source).await?;

        match self.receive_spooled(&command, user_id, spool_path.clone()).await {
            Ok(result) => Ok(result),
            Err(e) => {
                // Keep quarantined archives; everything else is junk.
                if let Err(cleanup) = tokio::fs::remove_file(&spool_path).await {
                    warn!(path = %spool_path.display(), error = %cleanup, "spool cleanup failed");
                }
                Err(e)
            }
        }
    }

    /// Streams the upload to a per-run temp file, recording the true byte
    /// count via file metadata.
    async fn spool<S>(&self, mut source: S) -> Result<PathBuf, IntakeError>
    where
        S: Stream<Item = Result<Bytes, IntakeError>> + Unpin + Send,
    {
        tokio::fs::create_dir_all(&self.deps.temp_dir)
            .await
            .map_err(|e| IntakeError::io(format!("spool dir: {}", e)))?;
        let path = self.deps.temp_dir.join(format!("upload-{}.uhc", Uuid::new_v4()));
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| IntakeError::transport(format!("create spool file: {}", e)))?;
        let mut writer = tokio::io::BufWriter::with_capacity(SPOOL_BUFFER_BYTES, file);

        let copy = async {
            while let Some(chunk) = source.next().await {
                let chunk = chunk?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| IntakeError::transport(format!("spool write: {}", e)))?;
            }
            writer
                .flush()
                .await
                .map_err(|e| IntakeError::transport(format!("spool flush: {}", e)))
        };
        if let Err(e) = copy.await {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %cleanup, "partial spool cleanup failed");
            }
            return Err(e);
        }
        Ok(path)
    }

    async fn receive_spooled(
        &self,
        command: &ReceivePackageCommand,
        user_id: Uuid,
        spool_path: PathBuf,
    ) -> Result<UploadResult, IntakeError> {
        let deps = &self.deps;
        let file_size_bytes = tokio::fs::metadata(&spool_path)
            .await
            .map_err(|e| IntakeError::io(format!("spool metadata: {}", e)))?
            .len();

        let archive = UhcArchive::open(&spool_path).await?;
        let manifest = archive.read_manifest().await?;

        // Idempotency gate: a known package id short-circuits before any
        // integrity work. The fresh spool file is redundant; losing the
        // cleanup race is logged and otherwise ignored.
        if let Some(existing) = deps.packages.find_by_package_id(manifest.package_id).await? {
            archive.close().await;
            if let Err(e) = tokio::fs::remove_file(&spool_path).await {
                warn!(path = %spool_path.display(), error = %e, "duplicate spool cleanup failed");
            }
            info!(package = %manifest.package_id, "duplicate package upload");
            return Ok(UploadResult {
                success: true,
                is_duplicate_package: true,
                quarantined: false,
                package: (&existing).into(),
                errors: Vec::new(),
                warnings: vec![format!(
                    "package {} was already received as {}",
                    manifest.package_id,
                    existing.package_number()
                )],
            });
        }

        let computed_checksum = archive.compute_content_checksum().await?;
        let is_checksum_valid = match manifest.declared_checksum() {
            None => true,
            Some(declared) => match Sha256Checksum::parse(declared) {
                Ok(declared) => declared == computed_checksum,
                Err(_) => false,
            },
        };

        let is_signature_valid = deps
            .signature
            .verify_archive(&spool_path, manifest.digital_signature.as_deref())
            .await?;

        let vocabulary_compatibility = VocabularyCompatibility::compare(
            &deps.vocabulary.current_versions(),
            &manifest.vocabulary_versions,
        );

        let now = deps.clock.now_utc();
        let package_number = deps.counters.next_package_number(now.year()).await?;
        let package = ImportPackage::receive(ImportPackageSeed {
            package_id: manifest.package_id,
            package_number,
            file_name: command.file_name.clone(),
            file_size_bytes,
            stored_path: spool_path.to_string_lossy().into_owned(),
            computed_checksum,
            manifest_checksum: manifest
                .declared_checksum()
                .and_then(|c| Sha256Checksum::parse(c).ok()),
            is_checksum_valid,
            digital_signature: manifest.digital_signature.clone(),
            is_signature_valid,
            schema_version: manifest.schema_version.clone(),
            is_schema_valid: manifest.is_schema_supported(),
            device_id: manifest.device_id.clone(),
            exported_by_user_id: manifest.exported_by_user_id,
            exported_date_utc: manifest.exported_date_utc,
            vocabulary_versions: manifest.vocabulary_versions.clone(),
            vocabulary_compatibility,
            declared_entity_counts: manifest.entity_counts.clone(),
            import_method: command.import_method,
            created_by: user_id,
            now,
        });
        archive.close().await;

        match deps.packages.save(&package).await {
            Ok(()) => {}
            Err(IntakeError::DuplicateBusinessIdentifier(_)) => {
                // Lost a race with a concurrent upload of the same archive.
                if let Some(existing) = deps.packages.find_by_package_id(manifest.package_id).await? {
                    if let Err(e) = tokio::fs::remove_file(&spool_path).await {
                        warn!(path = %spool_path.display(), error = %e, "duplicate spool cleanup failed");
                    }
                    return Ok(UploadResult {
                        success: true,
                        is_duplicate_package: true,
                        quarantined: false,
                        package: (&existing).into(),
                        errors: Vec::new(),
                        warnings: Vec::new(),
                    });
                }
                return Err(IntakeError::internal(format!(
                    "package {} vanished during duplicate resolution",
                    manifest.package_id
                )));
            }
            Err(e) => return Err(e),
        }

        deps.audit
            .log(
                AuditEntry::new("package-received", "import-package", package.id())
                    .by(Some(user_id))
                    .with_new_value(serde_json::json!({
                        "package_id": package.package_id(),
                        "package_number": package.package_number().as_str(),
                        "status": package.status().as_str(),
                        "file_name": package.file_name(),
                    })),
            )
            .await;

        let quarantined = package.status() == tenure_intake_domain::PackageStatus::Quarantined;
        let errors = if quarantined {
            vec![package.status_reason().unwrap_or("quarantined").to_string()]
        } else {
            Vec::new()
        };
        let warnings = if !quarantined {
            package.vocabulary_compatibility().issues()
        } else {
            Vec::new()
        };

        info!(
            package = %package.package_id(),
            number = package.package_number().as_str(),
            status = package.status().as_str(),
            size = file_size_bytes,
            "package received"
        );

        Ok(UploadResult {
            success: !quarantined,
            is_duplicate_package: false,
            quarantined,
            package: (&package).into(),
            errors,
            warnings,
        })
    }
}
