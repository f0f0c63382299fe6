// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validate Package Use Case
//!
//! Runs the staging loader and the validator back to back, advancing the
//! package `Pending → Validating → Validated | Invalid`.
//!
//! The loader streams archive rows into per-type staging tables in
//! topological order, preserving original UUIDs. It is idempotent within a
//! package: existing staging rows are truncated first, which is only
//! permitted while the package is in `Pending`, `Validating`, or `Invalid`.
//!
//! The validator runs six levels of checks; a row fails at the highest
//! level at which any check fails:
//!
//! 1. structural - required fields, string bounds, parseable payloads
//! 2. semantic - numeric ranges, non-future dates, cross-field consistency
//! 3. vocabulary - coded values against the server's code sets (relaxed to
//!    advisory for minor-difference domains)
//! 4. referential - intra-batch original-id resolution
//! 5. cross-package - business-identifier collisions against production
//!    (advisory: collisions surface as conflicts during detection)
//! 6. domain lifecycle - field claims are normalized to
//!    draft-pending-submission at commit
//!
//! Diagnostics are data, never exceptions.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use tenure_intake_domain::entities::records::{
    BuildingRecord, ClaimRecord, ClaimStatus, DocumentRecord, EvidenceRecord, HouseholdRecord,
    PersonPropertyRelationRecord, PersonRecord, PropertyUnitRecord, ReferralRecord, SurveyRecord,
};
use tenure_intake_domain::entities::staging::{EntityKind, StagingRow};
use tenure_intake_domain::entities::{ImportPackage, PackageStatus, StagingSummary, ValidationReport};
use tenure_intake_domain::services::ports::{AuditEntry, VocabularyRegistry};
use tenure_intake_domain::value_objects::{Diagnostic, Sha256Checksum};
use tenure_intake_domain::IntakeError;

use crate::application::commands::OperationOutcome;
use crate::application::services::intake_service::IntakeDeps;
use crate::infrastructure::archive::uhc_reader::UhcArchive;
use crate::infrastructure::services::package_lock::PackageLockGuard;

const MAX_NAME_LEN: usize = 100;
const MAX_IDENTIFIER_LEN: usize = 50;
const MAX_FILE_NAME_LEN: usize = 255;
const MAX_NATIONAL_ID_LEN: usize = 20;

pub struct ValidatePackageUseCase {
    deps: Arc<IntakeDeps>,
}

/// Shared read-only context for per-row validation.
struct ValidationContext {
    today: NaiveDate,
    vocabulary: Arc<dyn VocabularyRegistry>,
    /// Domains flagged MinorDifference at receipt: unknown codes downgrade
    /// to advisory because the archive may be ahead of the server.
    minor_domains: HashSet<String>,
    /// Original ids present in this package, per entity type.
    staged_ids: HashMap<EntityKind, HashSet<Uuid>>,
}

impl ValidatePackageUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<ValidationReport>, IntakeError> {
        let user_id = user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("validation requires a user".to_string()))?;
        let mut package = self
            .deps
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", package_id)))?;
        let guard = self.deps.locks.acquire(package.id(), "validate")?;

        if !matches!(
            package.status(),
            PackageStatus::Pending | PackageStatus::Validating | PackageStatus::Invalid
        ) {
            return Err(IntakeError::state_transition(format!(
                "package {} cannot be validated from {}",
                package.package_id(),
                package.status()
            )));
        }
        if package.status() != PackageStatus::Validating {
            package.begin_validation(self.deps.clock.now_utc())?;
            self.deps.packages.update(&package).await?;
        }

        let outcome = self.load_and_validate(&mut package, &guard).await;
        match outcome {
            Ok(report) => {
                self.deps
                    .audit
                    .log(
                        AuditEntry::new("package-validated", "import-package", package.id())
                            .by(Some(user_id))
                            .with_new_value(serde_json::json!({
                                "status": package.status().as_str(),
                                "errors": report.error_count,
                                "warnings": report.warning_count,
                            })),
                    )
                    .await;
                Ok(OperationOutcome::ok(&package, report))
            }
            Err(IntakeError::Cancelled(reason)) => {
                package.cancel(&reason, self.deps.clock.now_utc())?;
                self.deps.packages.update(&package).await?;
                Ok(OperationOutcome::failed(&package, vec![reason]))
            }
            Err(e) => Err(e),
        }
    }

    async fn load_and_validate(
        &self,
        package: &mut ImportPackage,
        guard: &PackageLockGuard,
    ) -> Result<ValidationReport, IntakeError> {
        let deps = &self.deps;

        // --- loader ---------------------------------------------------------
        deps.staging.delete_for_package(package.id()).await?;
        let archive = UhcArchive::open(Path::new(package.stored_path())).await?;

        let mut staged_ids: HashMap<EntityKind, HashSet<Uuid>> = HashMap::new();
        let mut summary = StagingSummary::default();
        for kind in EntityKind::DEPENDENCY_ORDER {
            guard.check_cancelled()?;
            let archive_rows = archive.entity_rows(kind).await?;
            let ids: HashSet<Uuid> = archive_rows.iter().map(|r| r.original_entity_id).collect();
            let rows: Vec<StagingRow> = archive_rows
                .into_iter()
                .map(|r| StagingRow::new(package.id(), kind, r.original_entity_id, r.payload))
                .collect();
            summary.loaded.insert(kind, rows.len() as u64);
            deps.staging.insert_rows(&rows).await?;
            staged_ids.insert(kind, ids);
        }
        archive.close().await;
        let staged_counts: BTreeMap<String, u64> = summary
            .loaded
            .iter()
            .map(|(kind, count)| (kind.archive_table().to_string(), *count))
            .collect();
        package.record_staged_counts(staged_counts, deps.clock.now_utc());
        deps.packages.update(package).await?;
        info!(package = %package.package_id(), rows = summary.total(), "staging load complete");

        // --- validator ------------------------------------------------------
        let context = ValidationContext {
            today: deps.clock.now_utc().date_naive(),
            vocabulary: deps.vocabulary.clone(),
            minor_domains: package
                .vocabulary_compatibility()
                .minor_difference_domains()
                .into_iter()
                .map(str::to_string)
                .collect(),
            staged_ids,
        };

        let mut report = ValidationReport::default();
        for kind in EntityKind::DEPENDENCY_ORDER {
            guard.check_cancelled()?;
            let mut rows = deps.staging.rows_for_package(package.id(), kind).await?;
            let mut invalid_here = 0u64;
            for row in &mut rows {
                let diagnostics = self.diagnostics_for(kind, row, &context).await?;
                row.apply_diagnostics(diagnostics);
                report.error_count += row.validation_errors.len() as u64;
                report.warning_count += row.validation_warnings.len() as u64;
                match row.validation_status {
                    tenure_intake_domain::ValidationStatus::Invalid => {
                        report.invalid_rows += 1;
                        invalid_here += 1;
                    }
                    tenure_intake_domain::ValidationStatus::Warning => report.warning_rows += 1,
                    _ => report.valid_rows += 1,
                }
                deps.staging.update_row(row).await?;
            }
            if invalid_here > 0 {
                report.per_entity_invalid.insert(kind, invalid_here);
            }
        }

        package.complete_validation(
            report.error_count,
            report.warning_count,
            !report.is_valid(),
            deps.clock.now_utc(),
        )?;
        deps.packages.update(package).await?;
        info!(
            package = %package.package_id(),
            status = package.status().as_str(),
            errors = report.error_count,
            warnings = report.warning_count,
            "validation finished"
        );
        Ok(report)
    }

    /// All diagnostics for one staging row.
    async fn diagnostics_for(
        &self,
        kind: EntityKind,
        row: &StagingRow,
        ctx: &ValidationContext,
    ) -> Result<Vec<Diagnostic>, IntakeError> {
        let mut diags = Vec::new();
        match kind {
            EntityKind::Building => match row.payload_as::<BuildingRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => self.validate_building(&record, ctx, &mut diags).await?,
            },
            EntityKind::PropertyUnit => match row.payload_as::<PropertyUnitRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_property_unit(&record, ctx, &mut diags),
            },
            EntityKind::Person => match row.payload_as::<PersonRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => self.validate_person(&record, ctx, &mut diags).await?,
            },
            EntityKind::Household => match row.payload_as::<HouseholdRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_household(&record, ctx, &mut diags),
            },
            EntityKind::PersonPropertyRelation => {
                match row.payload_as::<PersonPropertyRelationRecord>() {
                    Err(_) => push_parse_failure(&mut diags),
                    Ok(record) => validate_relation(&record, ctx, &mut diags),
                }
            }
            EntityKind::Evidence => match row.payload_as::<EvidenceRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_evidence(&record, ctx, &mut diags),
            },
            EntityKind::Survey => match row.payload_as::<SurveyRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_survey(&record, ctx, &mut diags),
            },
            EntityKind::Claim => match row.payload_as::<ClaimRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_claim(&record, ctx, &mut diags),
            },
            EntityKind::Document => match row.payload_as::<DocumentRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_document(&record, ctx, &mut diags),
            },
            EntityKind::Referral => match row.payload_as::<ReferralRecord>() {
                Err(_) => push_parse_failure(&mut diags),
                Ok(record) => validate_referral(&record, ctx, &mut diags),
            },
        }
        Ok(diags)
    }

    async fn validate_building(
        &self,
        record: &BuildingRecord,
        ctx: &ValidationContext,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(), IntakeError> {
        match record.building_code() {
            Ok(code) => {
                // Level 5: the 17-digit code must be unique across the
                // registry; a collision surfaces as a building conflict.
                if self.deps.production.building_by_code(code.as_str()).await?.is_some() {
                    diags.push(Diagnostic::advisory(
                        "building-code-exists",
                        "building_code",
                        format!("building code {} already registered; duplicate detection will flag it", code),
                    ));
                }
            }
            Err(e) => {
                diags.push(Diagnostic::blocking("building-code-invalid", "building_code", e.to_string()));
            }
        }
        check_code(diags, ctx, "building_type", record.building_type.as_deref());
        Ok(())
    }

    async fn validate_person(
        &self,
        record: &PersonRecord,
        ctx: &ValidationContext,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<(), IntakeError> {
        check_required(diags, "first_name", &record.first_name, MAX_NAME_LEN);
        check_required(diags, "family_name", &record.family_name, MAX_NAME_LEN);
        check_optional_len(diags, "father_name", record.father_name.as_deref(), MAX_NAME_LEN);
        check_optional_len(diags, "national_id", record.national_id.as_deref(), MAX_NATIONAL_ID_LEN);
        check_not_future(diags, "date_of_birth", record.date_of_birth, ctx.today);
        check_code(diags, ctx, "nationality", record.nationality.as_deref());

        if let Some(nid) = record.national_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let exists = self
                .deps
                .production
                .national_id_exists(nid, record.governorate_code.as_deref())
                .await?;
            if exists {
                diags.push(Diagnostic::advisory(
                    "national-id-exists",
                    "national_id",
                    "national id already registered; duplicate detection will flag it",
                ));
            }
        }
        Ok(())
    }

}

/// Level 3 check shared by every coded field.
fn check_code(diags: &mut Vec<Diagnostic>, ctx: &ValidationContext, domain: &str, code: Option<&str>) {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        return;
    };
    if ctx.vocabulary.contains_code(domain, code) {
        return;
    }
    if ctx.minor_domains.contains(domain) {
        diags.push(Diagnostic::advisory(
            "unknown-code-newer-vocabulary",
            domain,
            format!("code {:?} is not in the server's {} code set; archive vocabulary is ahead", code, domain),
        ));
    } else {
        diags.push(Diagnostic::blocking(
            "unknown-code",
            domain,
            format!("code {:?} is not in the {} vocabulary", code, domain),
        ));
    }
}

fn push_parse_failure(diags: &mut Vec<Diagnostic>) {
    diags.push(Diagnostic::blocking(
        "structural-parse",
        "payload",
        "record payload does not match the entity schema",
    ));
}

fn check_required(diags: &mut Vec<Diagnostic>, path: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        diags.push(Diagnostic::blocking("required-field-missing", path, "must not be empty"));
    } else if value.chars().count() > max_len {
        diags.push(Diagnostic::blocking(
            "field-too-long",
            path,
            format!("exceeds {} characters", max_len),
        ));
    }
}

fn check_optional_len(diags: &mut Vec<Diagnostic>, path: &str, value: Option<&str>, max_len: usize) {
    if let Some(value) = value {
        if value.chars().count() > max_len {
            diags.push(Diagnostic::blocking(
                "field-too-long",
                path,
                format!("exceeds {} characters", max_len),
            ));
        }
    }
}

fn check_not_future(
    diags: &mut Vec<Diagnostic>,
    path: &str,
    date: Option<NaiveDate>,
    today: NaiveDate,
) {
    if let Some(date) = date {
        if date > today {
            diags.push(Diagnostic::blocking("date-in-future", path, format!("{} is in the future", date)));
        }
    }
}

fn check_share(diags: &mut Vec<Diagnostic>, path: &str, share: Option<f64>) {
    if let Some(share) = share {
        if !(0.0..=100.0).contains(&share) {
            diags.push(Diagnostic::blocking(
                "share-out-of-range",
                path,
                format!("{} is outside 0-100", share),
            ));
        }
    }
}

fn check_fk(
    diags: &mut Vec<Diagnostic>,
    ctx: &ValidationContext,
    path: &str,
    id: Uuid,
    kind: EntityKind,
) {
    let resolves = ctx.staged_ids.get(&kind).is_some_and(|ids| ids.contains(&id));
    if !resolves {
        diags.push(Diagnostic::blocking(
            "unresolved-reference",
            path,
            format!("{} does not reference a staged {}", id, kind),
        ));
    }
}

fn check_fk_optional(
    diags: &mut Vec<Diagnostic>,
    ctx: &ValidationContext,
    path: &str,
    id: Option<Uuid>,
    kind: EntityKind,
) {
    if let Some(id) = id {
        check_fk(diags, ctx, path, id, kind);
    }
}

fn validate_property_unit(
    record: &PropertyUnitRecord,
    ctx: &ValidationContext,
    diags: &mut Vec<Diagnostic>,
) {
    check_required(diags, "unit_identifier", &record.unit_identifier, MAX_IDENTIFIER_LEN);
    check_fk(diags, ctx, "building_id", record.building_id, EntityKind::Building);
    check_code(diags, ctx, "unit_type", record.unit_type.as_deref());
    if let Some(area) = record.area_square_meters {
        if area < 0.0 {
            diags.push(Diagnostic::blocking("negative-area", "area_square_meters", "must not be negative"));
        }
    }
}

fn validate_household(record: &HouseholdRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk_optional(
        diags,
        ctx,
        "head_of_household_person_id",
        record.head_of_household_person_id,
        EntityKind::Person,
    );
    check_fk_optional(
        diags,
        ctx,
        "residence_property_unit_id",
        record.residence_property_unit_id,
        EntityKind::PropertyUnit,
    );
    // Household size must equal the sum of the age buckets within a +-1
    // tolerance, when everything is reported.
    if let (Some(size), Some(a), Some(b), Some(c)) = (
        record.household_size,
        record.members_under_18,
        record.members_18_to_60,
        record.members_over_60,
    ) {
        let sum = a + b + c;
        if size.abs_diff(sum) > 1 {
            diags.push(Diagnostic::blocking(
                "household-size-mismatch",
                "household_size",
                format!("size {} does not match age buckets totalling {}", size, sum),
            ));
        }
    }
}

fn validate_relation(
    record: &PersonPropertyRelationRecord,
    ctx: &ValidationContext,
    diags: &mut Vec<Diagnostic>,
) {
    check_fk(diags, ctx, "person_id", record.person_id, EntityKind::Person);
    check_fk(diags, ctx, "property_unit_id", record.property_unit_id, EntityKind::PropertyUnit);
    check_code(diags, ctx, "tenure_type", record.relation_type.as_deref());
    check_share(diags, "ownership_share_percent", record.ownership_share_percent);
    check_not_future(diags, "start_date", record.start_date, ctx.today);
}

fn validate_evidence(record: &EvidenceRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk_optional(diags, ctx, "person_id", record.person_id, EntityKind::Person);
    check_code(diags, ctx, "evidence_type", record.evidence_type.as_deref());
    check_optional_len(diags, "file_name", record.file_name.as_deref(), MAX_FILE_NAME_LEN);
    check_not_future(diags, "issued_date", record.issued_date, ctx.today);
    if let Some(hash) = record.attachment_hash.as_deref() {
        if Sha256Checksum::parse(hash).is_err() {
            diags.push(Diagnostic::blocking(
                "attachment-hash-invalid",
                "attachment_hash",
                "not a lowercase SHA-256 hex digest",
            ));
        }
    }
}

fn validate_survey(record: &SurveyRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk(diags, ctx, "building_id", record.building_id, EntityKind::Building);
    check_not_future(diags, "survey_date", record.survey_date, ctx.today);
}

fn validate_claim(record: &ClaimRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk(diags, ctx, "primary_claimant_id", record.primary_claimant_id, EntityKind::Person);
    check_fk(diags, ctx, "property_unit_id", record.property_unit_id, EntityKind::PropertyUnit);
    check_code(diags, ctx, "claim_type", record.claim_type.as_deref());
    check_share(diags, "claimed_share_percent", record.claimed_share_percent);
    check_not_future(diags, "submission_date", record.submission_date, ctx.today);
    // Level 6: whatever the device exported, commit normalizes the claim to
    // draft-pending-submission.
    if let Some(status) = record.status.as_deref() {
        if status != ClaimStatus::DraftPendingSubmission.as_str() {
            diags.push(Diagnostic::advisory(
                "claim-status-normalized",
                "status",
                format!("status {:?} will map to draft-pending-submission on commit", status),
            ));
        }
    }
}

fn validate_document(record: &DocumentRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk_optional(diags, ctx, "claim_id", record.claim_id, EntityKind::Claim);
    check_code(diags, ctx, "document_type", record.document_type.as_deref());
    check_optional_len(diags, "file_name", record.file_name.as_deref(), MAX_FILE_NAME_LEN);
    if let Some(hash) = record.attachment_hash.as_deref() {
        if Sha256Checksum::parse(hash).is_err() {
            diags.push(Diagnostic::blocking(
                "attachment-hash-invalid",
                "attachment_hash",
                "not a lowercase SHA-256 hex digest",
            ));
        }
    }
}

fn validate_referral(record: &ReferralRecord, ctx: &ValidationContext, diags: &mut Vec<Diagnostic>) {
    check_fk(diags, ctx, "claim_id", record.claim_id, EntityKind::Claim);
    check_not_future(diags, "referral_date", record.referral_date, ctx.today);
}
