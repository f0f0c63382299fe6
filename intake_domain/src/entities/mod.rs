// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities for the package intake pipeline.

pub mod commit_report;
pub mod conflict_resolution;
pub mod import_package;
pub mod records;
pub mod staging;

pub use commit_report::{
    CommitReport, DuplicateReport, EntityCommitSummary, StagingSummary, ValidationReport,
};
pub use conflict_resolution::{
    ConflictDecision, ConflictEntityType, ConflictResolution, DuplicateCandidate,
};
pub use import_package::{ImportMethod, ImportPackage, ImportPackageSeed, PackageStatus};
pub use records::{
    BuildingRecord, ClaimRecord, ClaimStatus, DocumentRecord, EvidenceRecord, Gender,
    HouseholdRecord, PersonPropertyRelationRecord, PersonRecord, PropertyUnitRecord,
    ReferralRecord, SurveyRecord,
};
pub use staging::{EntityKind, StagingRow, ValidationStatus};
