// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commands and Results
//!
//! Plain records crossing the application boundary. Every mutating call
//! returns a structured outcome: a success flag, the updated package
//! snapshot, an error list, and a warning list. Stage-specific payloads
//! (validation report, duplicate report, commit report) ride along when the
//! stage produces one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::{
    ConflictDecision, ConflictResolution, DuplicateCandidate,
};
use tenure_intake_domain::entities::staging::{StagingRow, ValidationStatus};
use tenure_intake_domain::entities::{ImportMethod, ImportPackage, PackageStatus};
use tenure_intake_domain::value_objects::Diagnostic;

/// Upload entry point command. The archive bytes travel separately as a
/// stream.
#[derive(Debug, Clone)]
pub struct ReceivePackageCommand {
    pub file_name: String,
    pub import_method: ImportMethod,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ResolveConflictCommand {
    pub conflict_id: Uuid,
    pub decision: ConflictDecision,
    pub chosen_master_id: Option<Uuid>,
    pub justification: String,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CancelPackageCommand {
    pub package_id: Uuid,
    pub reason: String,
    pub cleanup_staging: bool,
    pub user_id: Option<Uuid>,
}

/// Read-model view of an `ImportPackage` for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSnapshot {
    pub id: Uuid,
    pub package_id: Uuid,
    pub package_number: String,
    pub status: PackageStatus,
    pub status_reason: Option<String>,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub import_method: ImportMethod,
    pub is_checksum_valid: bool,
    pub is_signature_valid: bool,
    pub is_schema_valid: bool,
    pub is_vocabulary_compatible: bool,
    pub vocabulary_issues: Vec<String>,
    pub staged_entity_counts: std::collections::BTreeMap<String, u64>,
    pub validation_error_count: u64,
    pub validation_warning_count: u64,
    pub duplicate_count: u64,
    pub conflict_count: u64,
    pub are_conflicts_resolved: bool,
    pub committed_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub committed_date: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub archive_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ImportPackage> for PackageSnapshot {
    fn from(pkg: &ImportPackage) -> Self {
        PackageSnapshot {
            id: pkg.id(),
            package_id: pkg.package_id(),
            package_number: pkg.package_number().to_string(),
            status: pkg.status(),
            status_reason: pkg.status_reason().map(str::to_string),
            file_name: pkg.file_name().to_string(),
            file_size_bytes: pkg.file_size_bytes(),
            import_method: pkg.import_method(),
            is_checksum_valid: pkg.is_checksum_valid(),
            is_signature_valid: pkg.is_signature_valid(),
            is_schema_valid: pkg.is_schema_valid(),
            is_vocabulary_compatible: pkg.vocabulary_compatibility().is_compatible(),
            vocabulary_issues: pkg.vocabulary_compatibility().issues(),
            staged_entity_counts: pkg.staged_entity_counts().clone(),
            validation_error_count: pkg.validation_error_count(),
            validation_warning_count: pkg.validation_warning_count(),
            duplicate_count: pkg.duplicate_count(),
            conflict_count: pkg.conflict_count(),
            are_conflicts_resolved: pkg.are_conflicts_resolved(),
            committed_count: pkg.committed_count(),
            failed_count: pkg.failed_count(),
            skipped_count: pkg.skipped_count(),
            committed_date: pkg.committed_date(),
            is_archived: pkg.is_archived(),
            archive_path: pkg.archive_path().map(str::to_string),
            created_at: pkg.created_at(),
            updated_at: pkg.updated_at(),
        }
    }
}

/// Result of the upload entry point.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub success: bool,
    pub is_duplicate_package: bool,
    pub quarantined: bool,
    pub package: PackageSnapshot,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Shared envelope for the stage operations.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome<T: Serialize> {
    pub success: bool,
    pub package: PackageSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<T>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl<T: Serialize> OperationOutcome<T> {
    pub fn ok(package: &ImportPackage, report: T) -> Self {
        OperationOutcome {
            success: true,
            package: package.into(),
            report: Some(report),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn failed(package: &ImportPackage, errors: Vec<String>) -> Self {
        OperationOutcome {
            success: false,
            package: package.into(),
            report: None,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// One staging row as listed by the read side.
#[derive(Debug, Clone, Serialize)]
pub struct StagedEntityView {
    pub original_entity_id: Uuid,
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<Diagnostic>,
    pub validation_warnings: Vec<Diagnostic>,
    pub is_approved_for_commit: bool,
    pub committed_entity_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

impl From<&StagingRow> for StagedEntityView {
    fn from(row: &StagingRow) -> Self {
        StagedEntityView {
            original_entity_id: row.original_entity_id,
            validation_status: row.validation_status,
            validation_errors: row.validation_errors.clone(),
            validation_warnings: row.validation_warnings.clone(),
            is_approved_for_commit: row.is_approved_for_commit,
            committed_entity_id: row.committed_entity_id,
            payload: row.payload.clone(),
        }
    }
}

/// One conflict as listed by the read side.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictView {
    pub id: Uuid,
    pub entity_type: String,
    pub staging_original_id: Uuid,
    pub similarity_score: u8,
    pub suggested_master_id: Uuid,
    pub candidates: Vec<DuplicateCandidate>,
    pub decision: ConflictDecision,
    pub chosen_master_id: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub justification: Option<String>,
}

impl From<&ConflictResolution> for ConflictView {
    fn from(c: &ConflictResolution) -> Self {
        ConflictView {
            id: c.id(),
            entity_type: c.entity_type().to_string(),
            staging_original_id: c.staging_original_id(),
            similarity_score: c.similarity_score(),
            suggested_master_id: c.suggested_master_id(),
            candidates: c.candidates().to_vec(),
            decision: c.decision(),
            chosen_master_id: c.chosen_master_id(),
            resolved_by: c.resolved_by(),
            resolved_at: c.resolved_at(),
            justification: c.justification().map(str::to_string),
        }
    }
}
