// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commit Engine
//!
//! Promotes approved staging rows into production in one writable
//! transaction. Insertion follows the dependency order (buildings before
//! units before persons, claims before documents and referrals), and within
//! a type rows go in original-entity-id order so commit reports are
//! deterministic.
//!
//! Every staging foreign key is an original archive UUID; it is translated
//! through the in-memory id map built while inserting. Rows that resolved
//! to an existing production entity (merge / link decisions) seed the map,
//! so children committed from this package end up referencing the
//! production master. An unresolvable FK is fatal: the transaction rolls
//! back and nothing from the package is visible.
//!
//! Attachment blobs are deduplicated by SHA-256 against the blob store
//! before writing. Container archival runs **after** the database
//! transaction commits and is allowed to fail without undoing the commit -
//! the caller moves the package to `PartiallyCompleted` instead.

use chrono::Datelike;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use tenure_intake_domain::entities::commit_report::{CommitReport, EntityCommitSummary};
use tenure_intake_domain::entities::records::{
    BuildingRecord, ClaimRecord, ClaimStatus, DocumentRecord, EvidenceRecord, HouseholdRecord,
    PersonPropertyRelationRecord, PersonRecord, PropertyUnitRecord, ReferralRecord, SurveyRecord,
};
use tenure_intake_domain::entities::staging::{EntityKind, StagingRow};
use tenure_intake_domain::entities::ImportPackage;
use tenure_intake_domain::repositories::StagingRepository;
use tenure_intake_domain::services::name_matching::{family_name_prefix, normalize_unit_identifier};
use tenure_intake_domain::services::ports::{BlobStore, ClaimNumberGenerator, Clock};
use tenure_intake_domain::value_objects::Sha256Checksum;
use tenure_intake_domain::IntakeError;

use crate::infrastructure::archive::uhc_reader::UhcArchive;
use crate::infrastructure::services::package_lock::PackageLockGuard;

pub struct CommitEngine {
    pool: SqlitePool,
    staging: Arc<dyn StagingRepository>,
    blob_store: Arc<dyn BlobStore>,
    claim_numbers: Arc<dyn ClaimNumberGenerator>,
    clock: Arc<dyn Clock>,
}

fn map_insert_error(e: sqlx::Error, table: &str, context: &str) -> IntakeError {
    if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
        IntakeError::DuplicateBusinessIdentifier(format!("{}: {}", table, context))
    } else {
        IntakeError::database(format!("{}: {}", table, e))
    }
}

fn translate(
    id_map: &HashMap<Uuid, Uuid>,
    original: Uuid,
    kind: EntityKind,
    via: &str,
) -> Result<Uuid, IntakeError> {
    id_map.get(&original).copied().ok_or_else(|| {
        IntakeError::FkUnresolvable(format!(
            "{} references {} {} which was neither staged nor linked",
            via, kind, original
        ))
    })
}

fn translate_optional(
    id_map: &HashMap<Uuid, Uuid>,
    original: Option<Uuid>,
    kind: EntityKind,
    via: &str,
) -> Result<Option<Uuid>, IntakeError> {
    original.map(|o| translate(id_map, o, kind, via)).transpose()
}

impl CommitEngine {
    pub fn new(
        pool: SqlitePool,
        staging: Arc<dyn StagingRepository>,
        blob_store: Arc<dyn BlobStore>,
        claim_numbers: Arc<dyn ClaimNumberGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            staging,
            blob_store,
            claim_numbers,
            clock,
        }
    }

    /// Runs the staging→production promotion for one package. The caller
    /// has already moved the package to `Committing` and holds its stage
    /// lock; `guard` is polled at suspension points so a cancellation
    /// request aborts before the transaction commits.
    pub async fn promote(
        &self,
        package: &ImportPackage,
        guard: &PackageLockGuard,
    ) -> Result<CommitReport, IntakeError> {
        let started = Instant::now();
        let package_id = package.id();
        let archive = UhcArchive::open(Path::new(package.stored_path()))
            .await
            .map_err(|e| IntakeError::archive(format!("container unavailable for commit: {}", e)))?;

        // Load every staging row up front; the stage lock guarantees nobody
        // else mutates this package's staging while we work.
        let mut rows_by_kind: Vec<(EntityKind, Vec<StagingRow>)> = Vec::new();
        let mut id_map: HashMap<Uuid, Uuid> = HashMap::new();
        for kind in EntityKind::DEPENDENCY_ORDER {
            let rows = self.staging.rows_for_package(package_id, kind).await?;
            for row in &rows {
                if let Some(resolved) = row.committed_entity_id {
                    id_map.insert(row.original_entity_id, resolved);
                }
            }
            rows_by_kind.push((kind, rows));
        }

        let mut report = CommitReport {
            import_package_id: package_id,
            ..CommitReport::default()
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;

        for (kind, rows) in &rows_by_kind {
            guard.check_cancelled()?;
            let mut summary = EntityCommitSummary::default();
            for row in rows {
                if row.committed_entity_id.is_some() {
                    // Resolved to an existing production entity by a merge
                    // or link decision.
                    summary.skipped += 1;
                    continue;
                }
                if !row.is_approved_for_commit {
                    summary.skipped += 1;
                    continue;
                }
                summary.approved += 1;
                let production_id = self
                    .insert_row(&mut tx, &archive, *kind, row, &id_map, &mut report)
                    .await?;
                id_map.insert(row.original_entity_id, production_id);
                summary.committed += 1;
                summary.id_map.insert(row.original_entity_id, production_id);

                let update = format!(
                    "UPDATE {} SET committed_entity_id = ? WHERE id = ?",
                    kind.staging_table()
                );
                sqlx::query(&update)
                    .bind(production_id.to_string())
                    .bind(row.id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| IntakeError::database(e.to_string()))?;
            }
            report.per_entity.insert(*kind, summary);
        }

        guard.check_cancelled()?;
        tx.commit().await.map_err(|e| IntakeError::database(e.to_string()))?;

        // Archival is outside the transaction on purpose: the data is live
        // even when the move fails.
        let now = self.clock.now_utc();
        match self
            .blob_store
            .archive_package(Path::new(package.stored_path()), package.package_id(), now)
            .await
        {
            Ok(relative) => report.archive_path = Some(relative),
            Err(e) => {
                warn!(package = %package.package_id(), error = %e, "archival failed after commit");
                report.archive_error = Some(e.to_string());
            }
        }
        archive.close().await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            package = %package.package_id(),
            committed = report.committed_total(),
            skipped = report.skipped_total(),
            reused_attachments = report.attachments_reused,
            "commit transaction completed"
        );
        Ok(report)
    }

    /// Inserts one staging row into its production table, translating FKs
    /// and assigning business identifiers. Returns the new production id.
    async fn insert_row(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        archive: &UhcArchive,
        kind: EntityKind,
        row: &StagingRow,
        id_map: &HashMap<Uuid, Uuid>,
        report: &mut CommitReport,
    ) -> Result<Uuid, IntakeError> {
        let id = Uuid::new_v4();
        let via = format!("{} {}", kind, row.original_entity_id);
        match kind {
            EntityKind::Building => {
                let record: BuildingRecord = row.payload_as()?;
                let code = record.building_code()?;
                sqlx::query("INSERT INTO production_buildings (id, building_code, data) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind(code.as_str())
                    .bind(serde_json::to_string(&record)?)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_insert_error(e, "production_buildings", code.as_str()))?;
            }
            EntityKind::PropertyUnit => {
                let mut record: PropertyUnitRecord = row.payload_as()?;
                record.building_id = translate(id_map, record.building_id, EntityKind::Building, &via)?;
                record.unit_identifier = record.unit_identifier.trim().to_string();
                sqlx::query(
                    "INSERT INTO production_property_units (id, building_id, unit_identifier_norm, data) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(record.building_id.to_string())
                .bind(normalize_unit_identifier(&record.unit_identifier))
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_property_units", &record.unit_identifier))?;
            }
            EntityKind::Person => {
                let record: PersonRecord = row.payload_as()?;
                sqlx::query(
                    "INSERT INTO production_persons \
                     (id, national_id, governorate_code, birth_year, gender, family_prefix, data) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(record.national_id.as_deref().map(str::trim))
                .bind(record.governorate_code.as_deref())
                .bind(record.date_of_birth.map(|d| d.year()))
                .bind(record.gender.map(|g| g.to_string()))
                .bind(family_name_prefix(&record.family_name))
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_persons", &via))?;
            }
            EntityKind::Household => {
                let mut record: HouseholdRecord = row.payload_as()?;
                record.head_of_household_person_id = translate_optional(
                    id_map,
                    record.head_of_household_person_id,
                    EntityKind::Person,
                    &via,
                )?;
                record.residence_property_unit_id = translate_optional(
                    id_map,
                    record.residence_property_unit_id,
                    EntityKind::PropertyUnit,
                    &via,
                )?;
                sqlx::query("INSERT INTO production_households (id, data) VALUES (?, ?)")
                    .bind(id.to_string())
                    .bind(serde_json::to_string(&record)?)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_insert_error(e, "production_households", &via))?;
            }
            EntityKind::PersonPropertyRelation => {
                let mut record: PersonPropertyRelationRecord = row.payload_as()?;
                record.person_id = translate(id_map, record.person_id, EntityKind::Person, &via)?;
                record.property_unit_id =
                    translate(id_map, record.property_unit_id, EntityKind::PropertyUnit, &via)?;
                sqlx::query(
                    "INSERT INTO production_person_property_relations \
                     (id, person_id, property_unit_id, data) VALUES (?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(record.person_id.to_string())
                .bind(record.property_unit_id.to_string())
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_person_property_relations", &via))?;
            }
            EntityKind::Evidence => {
                let mut record: EvidenceRecord = row.payload_as()?;
                record.person_id =
                    translate_optional(id_map, record.person_id, EntityKind::Person, &via)?;
                if let Some(hash) = record.attachment_hash.clone() {
                    self.store_attachment(archive, &hash, report).await?;
                }
                sqlx::query(
                    "INSERT INTO production_evidences (id, person_id, blob_hash, data) VALUES (?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(record.person_id.map(|u| u.to_string()))
                .bind(record.attachment_hash.as_deref())
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_evidences", &via))?;
            }
            EntityKind::Survey => {
                let mut record: SurveyRecord = row.payload_as()?;
                record.building_id = translate(id_map, record.building_id, EntityKind::Building, &via)?;
                sqlx::query("INSERT INTO production_surveys (id, building_id, data) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind(record.building_id.to_string())
                    .bind(serde_json::to_string(&record)?)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_insert_error(e, "production_surveys", &via))?;
            }
            EntityKind::Claim => {
                let mut record: ClaimRecord = row.payload_as()?;
                record.primary_claimant_id =
                    translate(id_map, record.primary_claimant_id, EntityKind::Person, &via)?;
                record.property_unit_id =
                    translate(id_map, record.property_unit_id, EntityKind::PropertyUnit, &via)?;
                // Field-device claims always land as drafts pending
                // submission, whatever their exported status said.
                record.status = Some(ClaimStatus::DraftPendingSubmission.as_str().to_string());
                let year = self.clock.now_utc().year();
                let claim_number = self.claim_numbers.next_for(year).await?;
                sqlx::query(
                    "INSERT INTO production_claims \
                     (id, claim_number, primary_claimant_id, property_unit_id, data) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(claim_number.as_str())
                .bind(record.primary_claimant_id.to_string())
                .bind(record.property_unit_id.to_string())
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_claims", claim_number.as_str()))?;
            }
            EntityKind::Document => {
                let mut record: DocumentRecord = row.payload_as()?;
                record.claim_id = translate_optional(id_map, record.claim_id, EntityKind::Claim, &via)?;
                if let Some(hash) = record.attachment_hash.clone() {
                    self.store_attachment(archive, &hash, report).await?;
                }
                sqlx::query(
                    "INSERT INTO production_documents (id, claim_id, blob_hash, data) VALUES (?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(record.claim_id.map(|u| u.to_string()))
                .bind(record.attachment_hash.as_deref())
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_insert_error(e, "production_documents", &via))?;
            }
            EntityKind::Referral => {
                let mut record: ReferralRecord = row.payload_as()?;
                record.claim_id = translate(id_map, record.claim_id, EntityKind::Claim, &via)?;
                sqlx::query("INSERT INTO production_referrals (id, claim_id, data) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind(record.claim_id.to_string())
                    .bind(serde_json::to_string(&record)?)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_insert_error(e, "production_referrals", &via))?;
            }
        }
        Ok(id)
    }

    /// Content-addressed attachment write with dedup. An identical blob
    /// already in the store is reused and counted as saved bytes; a new
    /// blob is pulled out of the archive, re-hashed, and stored.
    async fn store_attachment(
        &self,
        archive: &UhcArchive,
        hash_str: &str,
        report: &mut CommitReport,
    ) -> Result<(), IntakeError> {
        let hash = Sha256Checksum::parse(hash_str)
            .map_err(|e| IntakeError::blob_store(format!("attachment hash: {}", e)))?;

        if let Some(existing) = self.blob_store.probe_by_hash(&hash).await? {
            report.attachments_reused += 1;
            report.deduplication_bytes_saved += existing.size_bytes;
            return Ok(());
        }

        let content = archive
            .blob_content(hash.as_str())
            .await?
            .ok_or_else(|| {
                IntakeError::blob_store(format!("attachment {} missing from container", hash))
            })?;
        let actual = Sha256Checksum::from_bytes(&content);
        if actual != hash {
            return Err(IntakeError::blob_store(format!(
                "attachment content hashes to {} but is cataloged as {}",
                actual, hash
            )));
        }
        self.blob_store.put(&hash, &content).await?;
        Ok(())
    }
}
