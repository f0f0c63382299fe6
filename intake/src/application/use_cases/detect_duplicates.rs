// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Detect Duplicates Use Case
//!
//! Scans staged persons, buildings, and property units against production
//! and creates unresolved `ConflictResolution` records for every pair
//! scoring at or above the conflict threshold, unless an earlier
//! keep-separate decision suppressed the pair.
//!
//! Person candidates are pulled by blocking keys (exact national id, or
//! birth-year + gender + first three letters of the normalized family
//! name) and scored 0-100 by national-id match, weighted Arabic name
//! similarity, date of birth, and gender. Buildings match on the exact
//! 17-digit code. Units match on building code + normalized identifier,
//! with a near-match at edit distance <= 2.
//!
//! With zero conflicts the package bypasses review and advances straight
//! to `ReadyToCommit`.

use chrono::Datelike;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::{
    ConflictEntityType, ConflictResolution, DuplicateCandidate,
};
use tenure_intake_domain::entities::records::{BuildingRecord, PersonRecord, PropertyUnitRecord};
use tenure_intake_domain::entities::staging::{EntityKind, ValidationStatus};
use tenure_intake_domain::entities::{DuplicateReport, PackageStatus};
use tenure_intake_domain::services::name_matching::{
    family_name_prefix, normalize_unit_identifier, person_detection_key, person_similarity,
    unit_detection_key, unit_identifier_distance, CANDIDATE_THRESHOLD, CONFLICT_THRESHOLD,
    PROPERTY_NEAR_MATCH_SCORE,
};
use tenure_intake_domain::services::ports::AuditEntry;
use tenure_intake_domain::value_objects::Sha256Checksum;
use tenure_intake_domain::IntakeError;

use crate::application::commands::OperationOutcome;
use crate::application::services::intake_service::IntakeDeps;

pub struct DetectDuplicatesUseCase {
    deps: Arc<IntakeDeps>,
}

impl DetectDuplicatesUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<DuplicateReport>, IntakeError> {
        let user_id = user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("detection requires a user".to_string()))?;
        let deps = &self.deps;
        let mut package = deps
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", package_id)))?;
        let guard = deps.locks.acquire(package.id(), "detect-duplicates")?;

        if package.status() != PackageStatus::Validated {
            return Err(IntakeError::state_transition(format!(
                "package {} cannot run duplicate detection from {}",
                package.package_id(),
                package.status()
            )));
        }
        package.begin_detection(deps.clock.now_utc())?;
        deps.packages.update(&package).await?;

        let mut report = DuplicateReport::default();
        let scan: Result<(), IntakeError> = async {
            self.detect_persons(package.id(), &mut report).await?;
            guard.check_cancelled()?;
            self.detect_buildings(package.id(), &mut report).await?;
            guard.check_cancelled()?;
            self.detect_units(package.id(), &mut report).await
        }
        .await;
        if let Err(e) = scan {
            if let IntakeError::Cancelled(reason) = e {
                package.cancel(&reason, deps.clock.now_utc())?;
                deps.packages.update(&package).await?;
                return Ok(OperationOutcome::failed(&package, vec![reason]));
            }
            return Err(e);
        }

        package.complete_detection(report.duplicate_count, report.conflict_count, deps.clock.now_utc())?;
        report.bypassed_review = package.status() == PackageStatus::ReadyToCommit;
        deps.packages.update(&package).await?;

        deps.audit
            .log(
                AuditEntry::new("duplicates-detected", "import-package", package.id())
                    .by(Some(user_id))
                    .with_new_value(serde_json::json!({
                        "conflicts": report.conflict_count,
                        "candidates": report.duplicate_count,
                        "status": package.status().as_str(),
                    })),
            )
            .await;
        info!(
            package = %package.package_id(),
            conflicts = report.conflict_count,
            bypassed = report.bypassed_review,
            "duplicate detection finished"
        );
        Ok(OperationOutcome::ok(&package, report))
    }

    async fn detect_persons(
        &self,
        package_id: Uuid,
        report: &mut DuplicateReport,
    ) -> Result<(), IntakeError> {
        let deps = &self.deps;
        let rows = deps.staging.rows_for_package(package_id, EntityKind::Person).await?;
        for row in rows {
            if !matches!(row.validation_status, ValidationStatus::Valid | ValidationStatus::Warning) {
                continue;
            }
            let record: PersonRecord = row.payload_as()?;

            // Candidate pull by blocking keys; both keys may fire.
            let mut candidates: HashMap<Uuid, tenure_intake_domain::repositories::ProductionPerson> =
                HashMap::new();
            if let Some(nid) = record.national_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                for person in deps.production.persons_by_national_id(nid).await? {
                    candidates.insert(person.id, person);
                }
            }
            if let (Some(dob), Some(gender)) = (record.date_of_birth, record.gender) {
                let prefix = family_name_prefix(&record.family_name);
                if !prefix.is_empty() {
                    for person in deps
                        .production
                        .persons_by_blocking_key(dob.year(), &gender.to_string(), &prefix)
                        .await?
                    {
                        candidates.insert(person.id, person);
                    }
                }
            }

            let mut scored: Vec<DuplicateCandidate> = candidates
                .values()
                .map(|candidate| DuplicateCandidate {
                    production_id: candidate.id,
                    score: person_similarity(&record, &candidate.record),
                    summary: format!(
                        "{} {} {}",
                        candidate.record.first_name,
                        candidate.record.father_name.as_deref().unwrap_or(""),
                        candidate.record.family_name
                    ),
                })
                .filter(|c| c.score >= CANDIDATE_THRESHOLD)
                .collect();
            scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.production_id.cmp(&b.production_id)));
            report.duplicate_count += scored.len() as u64;

            let Some(best) = scored.first() else { continue };
            if best.score < CONFLICT_THRESHOLD {
                continue;
            }

            let detection_key = person_detection_key(&record);
            if deps
                .conflicts
                .is_suppressed(ConflictEntityType::Person, &detection_key, best.production_id)
                .await?
            {
                continue;
            }
            self.create_conflict(
                package_id,
                ConflictEntityType::Person,
                row.original_entity_id,
                detection_key,
                scored,
                report,
                EntityKind::Person,
            )
            .await?;
        }
        Ok(())
    }

    async fn detect_buildings(
        &self,
        package_id: Uuid,
        report: &mut DuplicateReport,
    ) -> Result<(), IntakeError> {
        let deps = &self.deps;
        let rows = deps.staging.rows_for_package(package_id, EntityKind::Building).await?;
        for row in rows {
            if !matches!(row.validation_status, ValidationStatus::Valid | ValidationStatus::Warning) {
                continue;
            }
            let record: BuildingRecord = row.payload_as()?;
            let Ok(code) = record.building_code() else { continue };
            let Some(existing) = deps.production.building_by_code(code.as_str()).await? else {
                continue;
            };

            report.duplicate_count += 1;
            let detection_key = Sha256Checksum::from_bytes(code.as_str().as_bytes());
            if deps
                .conflicts
                .is_suppressed(ConflictEntityType::Building, &detection_key, existing)
                .await?
            {
                continue;
            }
            let candidates = vec![DuplicateCandidate {
                production_id: existing,
                score: 100,
                summary: format!("building {}", code),
            }];
            self.create_conflict(
                package_id,
                ConflictEntityType::Building,
                row.original_entity_id,
                detection_key,
                candidates,
                report,
                EntityKind::Building,
            )
            .await?;
        }
        Ok(())
    }

    async fn detect_units(
        &self,
        package_id: Uuid,
        report: &mut DuplicateReport,
    ) -> Result<(), IntakeError> {
        let deps = &self.deps;

        // Staged units carry their building as an original id; resolve it to
        // the staged building's 17-digit code.
        let buildings = deps.staging.rows_for_package(package_id, EntityKind::Building).await?;
        let mut code_by_original: HashMap<Uuid, String> = HashMap::new();
        for row in &buildings {
            if let Ok(record) = row.payload_as::<BuildingRecord>() {
                if let Ok(code) = record.building_code() {
                    code_by_original.insert(row.original_entity_id, code.as_str().to_string());
                }
            }
        }

        let rows = deps.staging.rows_for_package(package_id, EntityKind::PropertyUnit).await?;
        for row in rows {
            if !matches!(row.validation_status, ValidationStatus::Valid | ValidationStatus::Warning) {
                continue;
            }
            let record: PropertyUnitRecord = row.payload_as()?;
            let Some(code) = code_by_original.get(&record.building_id) else { continue };

            let staged_norm = normalize_unit_identifier(&record.unit_identifier);
            let mut candidates = Vec::new();
            for unit in deps.production.units_for_building_code(code).await? {
                let existing_norm = normalize_unit_identifier(&unit.record.unit_identifier);
                let score = if existing_norm == staged_norm {
                    100
                } else if unit_identifier_distance(&record.unit_identifier, &unit.record.unit_identifier) <= 2 {
                    PROPERTY_NEAR_MATCH_SCORE
                } else {
                    continue;
                };
                candidates.push(DuplicateCandidate {
                    production_id: unit.id,
                    score,
                    summary: format!("unit {} in building {}", unit.record.unit_identifier, code),
                });
            }
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.production_id.cmp(&b.production_id)));
            report.duplicate_count += candidates.len() as u64;

            let detection_key = unit_detection_key(code, &record.unit_identifier);
            if deps
                .conflicts
                .is_suppressed(ConflictEntityType::PropertyUnit, &detection_key, candidates[0].production_id)
                .await?
            {
                continue;
            }
            self.create_conflict(
                package_id,
                ConflictEntityType::PropertyUnit,
                row.original_entity_id,
                detection_key,
                candidates,
                report,
                EntityKind::PropertyUnit,
            )
            .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_conflict(
        &self,
        package_id: Uuid,
        entity_type: ConflictEntityType,
        staging_original_id: Uuid,
        detection_key: Sha256Checksum,
        candidates: Vec<DuplicateCandidate>,
        report: &mut DuplicateReport,
        kind: EntityKind,
    ) -> Result<(), IntakeError> {
        let conflict = ConflictResolution::detect(
            package_id,
            entity_type,
            staging_original_id,
            detection_key,
            candidates,
            self.deps.clock.now_utc(),
        )?;
        self.deps.conflicts.insert(&conflict).await?;
        report.conflict_count += 1;
        *report.per_entity_conflicts.entry(kind).or_insert(0) += 1;
        Ok(())
    }
}
