// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Import Package Aggregate
//!
//! `ImportPackage` is the aggregate root of one intake run. It is created
//! the moment an uploaded archive is accepted - even when the archive is
//! quarantined - and every later stage (staging, validation, duplicate
//! detection, conflict review, commit, archival, cancellation) records its
//! outcome on this aggregate.
//!
//! ## State machine
//!
//! ```text
//! Pending ──► Validating ──► Validated ──► DetectingDuplicates ──► ReviewingConflicts ──► ReadyToCommit ──► Committing ──► Completed
//!    │           │              ▲                   │                                          │                │
//!    │           ▼              │                   └── (zero conflicts) ──► ReadyToCommit     ▼                ▼
//!    │        Invalid ──────────┘ (re-validate)                                            CommitFailed    PartiallyCompleted
//!    ▼
//! Quarantined
//!
//! Cancelled is reachable from every non-terminal state.
//! ```
//!
//! Terminal states: `Completed`, `PartiallyCompleted`, `Cancelled`,
//! `Quarantined`. `CommitFailed` is recoverable by re-commit; `Invalid` by
//! re-validation. All transitions go through [`ImportPackage::transition_to`],
//! which rejects any edge not in the graph, so an illegal transition can
//! never be persisted.
//!
//! ## Invariants
//!
//! - `package_id` (from the manifest) is globally unique - enforces
//!   idempotent receipt.
//! - counts are unsigned and therefore never negative.
//! - `committed_date` is set iff status is `Completed` or
//!   `PartiallyCompleted`.
//! - `archived_date` is set iff `is_archived`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::{PackageNumber, Sha256Checksum, VocabularyCompatibility};
use crate::IntakeError;

/// How the archive reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMethod {
    Manual,
    NetworkSync,
    WatchedFolder,
}

impl Display for ImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ImportMethod::Manual => "manual",
            ImportMethod::NetworkSync => "network-sync",
            ImportMethod::WatchedFolder => "watched-folder",
        };
        f.write_str(text)
    }
}

impl FromStr for ImportMethod {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(ImportMethod::Manual),
            "network-sync" | "networksync" => Ok(ImportMethod::NetworkSync),
            "watched-folder" | "watchedfolder" => Ok(ImportMethod::WatchedFolder),
            other => Err(IntakeError::InvalidConfiguration(format!(
                "unknown import method {:?}",
                other
            ))),
        }
    }
}

/// Lifecycle status of an intake run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    Pending,
    Quarantined,
    Validating,
    Invalid,
    Validated,
    DetectingDuplicates,
    ReviewingConflicts,
    ReadyToCommit,
    Committing,
    CommitFailed,
    Completed,
    PartiallyCompleted,
    Cancelled,
}

impl PackageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PackageStatus::Completed
                | PackageStatus::PartiallyCompleted
                | PackageStatus::Cancelled
                | PackageStatus::Quarantined
        )
    }

    /// Whether the state machine permits an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: PackageStatus) -> bool {
        use PackageStatus::*;
        if *self == next {
            return false;
        }
        // Cancellation is accepted from any non-terminal status.
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Pending, Validating)
                | (Pending, Quarantined)
                | (Validating, Validated)
                | (Validating, Invalid)
                | (Invalid, Validating)
                | (Validated, DetectingDuplicates)
                | (DetectingDuplicates, ReviewingConflicts)
                | (DetectingDuplicates, ReadyToCommit)
                | (ReviewingConflicts, ReadyToCommit)
                | (ReadyToCommit, Committing)
                | (Committing, Completed)
                | (Committing, PartiallyCompleted)
                | (Committing, CommitFailed)
                | (CommitFailed, Committing)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::Quarantined => "quarantined",
            PackageStatus::Validating => "validating",
            PackageStatus::Invalid => "invalid",
            PackageStatus::Validated => "validated",
            PackageStatus::DetectingDuplicates => "detecting-duplicates",
            PackageStatus::ReviewingConflicts => "reviewing-conflicts",
            PackageStatus::ReadyToCommit => "ready-to-commit",
            PackageStatus::Committing => "committing",
            PackageStatus::CommitFailed => "commit-failed",
            PackageStatus::Completed => "completed",
            PackageStatus::PartiallyCompleted => "partially-completed",
            PackageStatus::Cancelled => "cancelled",
        }
    }
}

impl Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PackageStatus::*;
        let status = match s {
            "pending" => Pending,
            "quarantined" => Quarantined,
            "validating" => Validating,
            "invalid" => Invalid,
            "validated" => Validated,
            "detecting-duplicates" => DetectingDuplicates,
            "reviewing-conflicts" => ReviewingConflicts,
            "ready-to-commit" => ReadyToCommit,
            "committing" => Committing,
            "commit-failed" => CommitFailed,
            "completed" => Completed,
            "partially-completed" => PartiallyCompleted,
            "cancelled" => Cancelled,
            other => {
                return Err(IntakeError::InternalError(format!("unknown package status {:?}", other)));
            }
        };
        Ok(status)
    }
}

/// Construction parameters gathered by the receiver.
#[derive(Debug, Clone)]
pub struct ImportPackageSeed {
    pub package_id: Uuid,
    pub package_number: PackageNumber,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub stored_path: String,
    pub computed_checksum: Sha256Checksum,
    pub manifest_checksum: Option<Sha256Checksum>,
    pub is_checksum_valid: bool,
    pub digital_signature: Option<String>,
    pub is_signature_valid: bool,
    pub schema_version: String,
    pub is_schema_valid: bool,
    pub device_id: String,
    pub exported_by_user_id: Uuid,
    pub exported_date_utc: DateTime<Utc>,
    pub vocabulary_versions: BTreeMap<String, String>,
    pub vocabulary_compatibility: VocabularyCompatibility,
    pub declared_entity_counts: BTreeMap<String, u64>,
    pub import_method: ImportMethod,
    pub created_by: Uuid,
    pub now: DateTime<Utc>,
}

/// Aggregate root of one package intake run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPackage {
    id: Uuid,
    package_id: Uuid,
    package_number: PackageNumber,
    file_name: String,
    file_size_bytes: u64,
    /// Current on-disk location of the container: the spool path until
    /// archival moves it under the archive root.
    stored_path: String,
    computed_checksum: Sha256Checksum,
    manifest_checksum: Option<Sha256Checksum>,
    is_checksum_valid: bool,
    digital_signature: Option<String>,
    is_signature_valid: bool,
    schema_version: String,
    is_schema_valid: bool,
    device_id: String,
    exported_by_user_id: Uuid,
    exported_date_utc: DateTime<Utc>,
    vocabulary_versions: BTreeMap<String, String>,
    vocabulary_compatibility: VocabularyCompatibility,
    /// Declared counts from the manifest, keyed by archive table name.
    declared_entity_counts: BTreeMap<String, u64>,
    /// Actual staged counts, keyed by archive table name.
    staged_entity_counts: BTreeMap<String, u64>,
    validation_error_count: u64,
    validation_warning_count: u64,
    duplicate_count: u64,
    conflict_count: u64,
    are_conflicts_resolved: bool,
    committed_count: u64,
    failed_count: u64,
    skipped_count: u64,
    committed_date: Option<DateTime<Utc>>,
    archive_path: Option<String>,
    is_archived: bool,
    archived_date: Option<DateTime<Utc>>,
    import_method: ImportMethod,
    status: PackageStatus,
    /// Why the package is quarantined / cancelled / commit-failed.
    status_reason: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ImportPackage {
    /// Creates the aggregate in `Pending`, or `Quarantined` when the
    /// receiver found an integrity or compatibility fault. The first
    /// matching quarantine reason (checksum, then signature, then
    /// vocabulary, then schema) is recorded.
    pub fn receive(seed: ImportPackageSeed) -> Self {
        let quarantine_reason = if !seed.is_checksum_valid {
            Some("content checksum mismatch".to_string())
        } else if !seed.is_signature_valid {
            Some("digital signature rejected".to_string())
        } else if !seed.vocabulary_compatibility.is_compatible() {
            Some(format!(
                "vocabulary incompatible: {}",
                seed.vocabulary_compatibility.issues().join("; ")
            ))
        } else if !seed.is_schema_valid {
            Some(format!("unsupported schema version {}", seed.schema_version))
        } else {
            None
        };
        let status = if quarantine_reason.is_some() {
            PackageStatus::Quarantined
        } else {
            PackageStatus::Pending
        };

        ImportPackage {
            id: Uuid::new_v4(),
            package_id: seed.package_id,
            package_number: seed.package_number,
            file_name: seed.file_name,
            file_size_bytes: seed.file_size_bytes,
            stored_path: seed.stored_path,
            computed_checksum: seed.computed_checksum,
            manifest_checksum: seed.manifest_checksum,
            is_checksum_valid: seed.is_checksum_valid,
            digital_signature: seed.digital_signature,
            is_signature_valid: seed.is_signature_valid,
            schema_version: seed.schema_version,
            is_schema_valid: seed.is_schema_valid,
            device_id: seed.device_id,
            exported_by_user_id: seed.exported_by_user_id,
            exported_date_utc: seed.exported_date_utc,
            vocabulary_versions: seed.vocabulary_versions,
            vocabulary_compatibility: seed.vocabulary_compatibility,
            declared_entity_counts: seed.declared_entity_counts,
            staged_entity_counts: BTreeMap::new(),
            validation_error_count: 0,
            validation_warning_count: 0,
            duplicate_count: 0,
            conflict_count: 0,
            are_conflicts_resolved: true,
            committed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            committed_date: None,
            archive_path: None,
            is_archived: false,
            archived_date: None,
            import_method: seed.import_method,
            status,
            status_reason: quarantine_reason,
            created_by: seed.created_by,
            created_at: seed.now,
            updated_at: seed.now,
        }
    }

    // --- state machine -----------------------------------------------------

    /// Moves the aggregate along one edge of the state machine.
    pub fn transition_to(&mut self, next: PackageStatus, now: DateTime<Utc>) -> Result<(), IntakeError> {
        if !self.status.can_transition_to(next) {
            return Err(IntakeError::StateTransitionInvalid(format!(
                "package {}: {} -> {} is not allowed",
                self.package_id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Loader entry: `Pending` (first load) or `Invalid` (re-validation).
    pub fn begin_validation(&mut self, now: DateTime<Utc>) -> Result<(), IntakeError> {
        self.transition_to(PackageStatus::Validating, now)
    }

    pub fn record_staged_counts(&mut self, counts: BTreeMap<String, u64>, now: DateTime<Utc>) {
        self.staged_entity_counts = counts;
        self.updated_at = now;
    }

    pub fn complete_validation(
        &mut self,
        error_count: u64,
        warning_count: u64,
        has_invalid_rows: bool,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        let next = if has_invalid_rows {
            PackageStatus::Invalid
        } else {
            PackageStatus::Validated
        };
        self.transition_to(next, now)?;
        self.validation_error_count = error_count;
        self.validation_warning_count = warning_count;
        Ok(())
    }

    pub fn begin_detection(&mut self, now: DateTime<Utc>) -> Result<(), IntakeError> {
        self.transition_to(PackageStatus::DetectingDuplicates, now)
    }

    /// Detector exit: with conflicts the package waits for review, without
    /// any it advances straight to `ReadyToCommit`.
    pub fn complete_detection(
        &mut self,
        duplicate_count: u64,
        conflict_count: u64,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        let next = if conflict_count > 0 {
            PackageStatus::ReviewingConflicts
        } else {
            PackageStatus::ReadyToCommit
        };
        self.transition_to(next, now)?;
        self.duplicate_count = duplicate_count;
        self.conflict_count = conflict_count;
        self.are_conflicts_resolved = conflict_count == 0;
        Ok(())
    }

    /// Called after each conflict decision with the number still unresolved.
    pub fn record_conflict_progress(
        &mut self,
        unresolved_remaining: u64,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        self.are_conflicts_resolved = unresolved_remaining == 0;
        self.updated_at = now;
        if self.are_conflicts_resolved && self.status == PackageStatus::ReviewingConflicts {
            self.transition_to(PackageStatus::ReadyToCommit, now)?;
        }
        Ok(())
    }

    pub fn begin_commit(&mut self, now: DateTime<Utc>) -> Result<(), IntakeError> {
        if !self.are_conflicts_resolved {
            return Err(IntakeError::ConflictUnresolved(format!(
                "package {} has unresolved conflicts",
                self.package_id
            )));
        }
        self.transition_to(PackageStatus::Committing, now)
    }

    pub fn complete_commit(
        &mut self,
        committed: u64,
        failed: u64,
        skipped: u64,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        self.transition_to(PackageStatus::Completed, now)?;
        self.committed_count = committed;
        self.failed_count = failed;
        self.skipped_count = skipped;
        self.committed_date = Some(now);
        Ok(())
    }

    /// Commit transaction succeeded but archival did not: data is live, the
    /// container is still at its spool path.
    pub fn complete_commit_partial(
        &mut self,
        committed: u64,
        failed: u64,
        skipped: u64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        self.transition_to(PackageStatus::PartiallyCompleted, now)?;
        self.committed_count = committed;
        self.failed_count = failed;
        self.skipped_count = skipped;
        self.committed_date = Some(now);
        self.status_reason = Some(reason.into());
        Ok(())
    }

    pub fn fail_commit(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), IntakeError> {
        self.transition_to(PackageStatus::CommitFailed, now)?;
        self.status_reason = Some(reason.into());
        Ok(())
    }

    /// Records the archived location. Only meaningful once commit work is
    /// done; keeps `archived_date` and `is_archived` in lockstep.
    pub fn mark_archived(&mut self, archive_path: impl Into<String>, now: DateTime<Utc>) {
        let path = archive_path.into();
        self.archive_path = Some(path.clone());
        self.stored_path = path;
        self.is_archived = true;
        self.archived_date = Some(now);
        self.updated_at = now;
    }

    /// Cancels the package. Idempotent: cancelling an already-cancelled
    /// package keeps the original reason and succeeds without a change.
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<bool, IntakeError> {
        if self.status == PackageStatus::Cancelled {
            return Ok(false);
        }
        self.transition_to(PackageStatus::Cancelled, now)?;
        self.status_reason = Some(reason.into());
        Ok(true)
    }

    // --- accessors ---------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The manifest-assigned package identity used for idempotency.
    pub fn package_id(&self) -> Uuid {
        self.package_id
    }

    pub fn package_number(&self) -> &PackageNumber {
        &self.package_number
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    pub fn stored_path(&self) -> &str {
        &self.stored_path
    }

    pub fn computed_checksum(&self) -> &Sha256Checksum {
        &self.computed_checksum
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.is_checksum_valid
    }

    pub fn is_signature_valid(&self) -> bool {
        self.is_signature_valid
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn is_schema_valid(&self) -> bool {
        self.is_schema_valid
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn vocabulary_versions(&self) -> &BTreeMap<String, String> {
        &self.vocabulary_versions
    }

    pub fn vocabulary_compatibility(&self) -> &VocabularyCompatibility {
        &self.vocabulary_compatibility
    }

    pub fn declared_entity_counts(&self) -> &BTreeMap<String, u64> {
        &self.declared_entity_counts
    }

    pub fn staged_entity_counts(&self) -> &BTreeMap<String, u64> {
        &self.staged_entity_counts
    }

    pub fn validation_error_count(&self) -> u64 {
        self.validation_error_count
    }

    pub fn validation_warning_count(&self) -> u64 {
        self.validation_warning_count
    }

    pub fn duplicate_count(&self) -> u64 {
        self.duplicate_count
    }

    pub fn conflict_count(&self) -> u64 {
        self.conflict_count
    }

    pub fn are_conflicts_resolved(&self) -> bool {
        self.are_conflicts_resolved
    }

    pub fn committed_count(&self) -> u64 {
        self.committed_count
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count
    }

    pub fn committed_date(&self) -> Option<DateTime<Utc>> {
        self.committed_date
    }

    pub fn archive_path(&self) -> Option<&str> {
        self.archive_path.as_deref()
    }

    pub fn is_archived(&self) -> bool {
        self.is_archived
    }

    pub fn archived_date(&self) -> Option<DateTime<Utc>> {
        self.archived_date
    }

    pub fn import_method(&self) -> ImportMethod {
        self.import_method
    }

    pub fn status(&self) -> PackageStatus {
        self.status
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::PackageNumber;

    fn seed(checksum_valid: bool) -> ImportPackageSeed {
        ImportPackageSeed {
            package_id: Uuid::new_v4(),
            package_number: PackageNumber::new(2025, 1),
            file_name: "field.uhc".to_string(),
            file_size_bytes: 1024,
            stored_path: "/tmp/field.uhc".to_string(),
            computed_checksum: Sha256Checksum::from_bytes(b"content"),
            manifest_checksum: None,
            is_checksum_valid: checksum_valid,
            digital_signature: None,
            is_signature_valid: true,
            schema_version: "1.0".to_string(),
            is_schema_valid: true,
            device_id: "tablet-001".to_string(),
            exported_by_user_id: Uuid::new_v4(),
            exported_date_utc: Utc::now(),
            vocabulary_versions: BTreeMap::new(),
            vocabulary_compatibility: VocabularyCompatibility::default(),
            declared_entity_counts: BTreeMap::new(),
            import_method: ImportMethod::Manual,
            created_by: Uuid::new_v4(),
            now: Utc::now(),
        }
    }

    #[test]
    fn test_receive_pending_when_clean() {
        let pkg = ImportPackage::receive(seed(true));
        assert_eq!(pkg.status(), PackageStatus::Pending);
        assert!(pkg.status_reason().is_none());
        assert!(pkg.are_conflicts_resolved());
    }

    #[test]
    fn test_receive_quarantines_on_checksum() {
        let pkg = ImportPackage::receive(seed(false));
        assert_eq!(pkg.status(), PackageStatus::Quarantined);
        assert!(pkg.status_reason().unwrap().contains("checksum"));
        assert!(pkg.status().is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        pkg.begin_validation(now).unwrap();
        pkg.complete_validation(0, 0, false, now).unwrap();
        pkg.begin_detection(now).unwrap();
        pkg.complete_detection(0, 0, now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::ReadyToCommit);
        pkg.begin_commit(now).unwrap();
        pkg.complete_commit(7, 0, 0, now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::Completed);
        assert!(pkg.committed_date().is_some());
    }

    #[test]
    fn test_conflicts_gate_commit() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        pkg.begin_validation(now).unwrap();
        pkg.complete_validation(0, 2, false, now).unwrap();
        pkg.begin_detection(now).unwrap();
        pkg.complete_detection(3, 2, now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::ReviewingConflicts);
        assert!(!pkg.are_conflicts_resolved());
        // A commit attempt while reviewing is rejected without a status change.
        assert!(pkg.begin_commit(now).is_err());
        assert_eq!(pkg.status(), PackageStatus::ReviewingConflicts);

        pkg.record_conflict_progress(1, now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::ReviewingConflicts);
        pkg.record_conflict_progress(0, now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::ReadyToCommit);
        assert!(pkg.begin_commit(now).is_ok());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        assert!(pkg.transition_to(PackageStatus::Committing, now).is_err());
        assert!(pkg.transition_to(PackageStatus::Completed, now).is_err());
        assert_eq!(pkg.status(), PackageStatus::Pending);
    }

    #[test]
    fn test_commit_failure_is_recoverable() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        pkg.begin_validation(now).unwrap();
        pkg.complete_validation(0, 0, false, now).unwrap();
        pkg.begin_detection(now).unwrap();
        pkg.complete_detection(0, 0, now).unwrap();
        pkg.begin_commit(now).unwrap();
        pkg.fail_commit("fk miss", now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::CommitFailed);
        // Retry is allowed.
        pkg.begin_commit(now).unwrap();
        assert_eq!(pkg.status(), PackageStatus::Committing);
    }

    #[test]
    fn test_cancel_is_idempotent_and_keeps_first_reason() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        assert!(pkg.cancel("operator abort", now).unwrap());
        assert!(!pkg.cancel("second reason", now).unwrap());
        assert_eq!(pkg.status(), PackageStatus::Cancelled);
        assert_eq!(pkg.status_reason(), Some("operator abort"));
    }

    #[test]
    fn test_cancel_rejected_in_terminal_states() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(false));
        assert_eq!(pkg.status(), PackageStatus::Quarantined);
        assert!(pkg.cancel("too late", now).is_err());
    }

    #[test]
    fn test_archival_invariant() {
        let now = Utc::now();
        let mut pkg = ImportPackage::receive(seed(true));
        assert!(!pkg.is_archived());
        assert!(pkg.archived_date().is_none());
        pkg.mark_archived("archives/2025/08/x.uhc", now);
        assert!(pkg.is_archived());
        assert!(pkg.archived_date().is_some());
        assert_eq!(pkg.stored_path(), "archives/2025/08/x.uhc");
    }
}
