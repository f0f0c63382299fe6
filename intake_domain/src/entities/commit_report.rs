// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Reports
//!
//! Structured summaries returned by the loader, validator, detector, and
//! commit engine. These are plain data - the caller decides what to do with
//! a report; no report type carries behavior beyond aggregation helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::entities::staging::EntityKind;

/// Loader output: rows staged per entity type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingSummary {
    pub loaded: BTreeMap<EntityKind, u64>,
}

impl StagingSummary {
    pub fn total(&self) -> u64 {
        self.loaded.values().sum()
    }
}

/// Validator output: per-type row statuses plus diagnostic totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid_rows: u64,
    pub warning_rows: u64,
    pub invalid_rows: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub per_entity_invalid: BTreeMap<EntityKind, u64>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.invalid_rows == 0
    }
}

/// Detector output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Candidate pairs examined that scored at or above the listing floor.
    pub duplicate_count: u64,
    /// Conflicts actually created (score at or above the conflict floor and
    /// not suppressed).
    pub conflict_count: u64,
    pub per_entity_conflicts: BTreeMap<EntityKind, u64>,
    /// True when the package advanced straight to `ReadyToCommit`.
    pub bypassed_review: bool,
}

/// Per-entity-type commit outcome with the staging→production id mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityCommitSummary {
    pub approved: u64,
    pub committed: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Original (archive) id → production id.
    pub id_map: BTreeMap<Uuid, Uuid>,
}

/// Commit engine output for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub import_package_id: Uuid,
    pub per_entity: BTreeMap<EntityKind, EntityCommitSummary>,
    /// Attachments that were already present in the blob store.
    pub attachments_reused: u64,
    pub deduplication_bytes_saved: u64,
    pub merges_performed: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    /// Relative archive path when archival succeeded.
    pub archive_path: Option<String>,
    /// Archival failure, recorded separately because it does not undo the
    /// commit - the package lands in `PartiallyCompleted` instead.
    pub archive_error: Option<String>,
}

impl CommitReport {
    pub fn committed_total(&self) -> u64 {
        self.per_entity.values().map(|s| s.committed).sum()
    }

    pub fn failed_total(&self) -> u64 {
        self.per_entity.values().map(|s| s.failed).sum()
    }

    pub fn skipped_total(&self) -> u64 {
        self.per_entity.values().map(|s| s.skipped).sum()
    }

    /// A fully successful commit has no errors and no failed rows.
    pub fn is_fully_successful(&self) -> bool {
        self.errors.is_empty() && self.failed_total() == 0
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.committed_total() + self.failed_total();
        if attempted == 0 {
            return 100.0;
        }
        (self.committed_total() as f64 / attempted as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_report_totals() {
        let mut report = CommitReport::default();
        report.per_entity.insert(
            EntityKind::Person,
            EntityCommitSummary {
                approved: 3,
                committed: 2,
                failed: 0,
                skipped: 1,
                id_map: BTreeMap::new(),
            },
        );
        report.per_entity.insert(
            EntityKind::Claim,
            EntityCommitSummary {
                approved: 1,
                committed: 1,
                failed: 0,
                skipped: 0,
                id_map: BTreeMap::new(),
            },
        );
        assert_eq!(report.committed_total(), 3);
        assert_eq!(report.skipped_total(), 1);
        assert!(report.is_fully_successful());
        assert_eq!(report.success_rate(), 100.0);
    }

    #[test]
    fn test_failed_rows_break_success() {
        let mut report = CommitReport::default();
        report.per_entity.insert(
            EntityKind::Person,
            EntityCommitSummary {
                approved: 2,
                committed: 1,
                failed: 1,
                skipped: 0,
                id_map: BTreeMap::new(),
            },
        );
        assert!(!report.is_fully_successful());
        assert_eq!(report.success_rate(), 50.0);
    }
}
