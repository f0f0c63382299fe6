// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repository Contracts
//!
//! Persistence abstractions between the pipeline and its stores. All
//! methods are asynchronous and implementations must be thread-safe
//! (`Send + Sync`). Transactional multi-row work (the commit promotion,
//! merge repointing) is owned by infrastructure engines bound to the
//! database pool; these contracts cover the row-level access every stage
//! shares.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::conflict_resolution::{ConflictEntityType, ConflictResolution};
use crate::entities::import_package::ImportPackage;
use crate::entities::records::{PersonRecord, PropertyUnitRecord};
use crate::entities::staging::{EntityKind, StagingRow};
use crate::value_objects::Sha256Checksum;
use crate::IntakeError;

/// Store of `ImportPackage` aggregates.
#[async_trait]
pub trait ImportPackageRepository: Send + Sync {
    /// Inserts a new aggregate. Fails with `DuplicateBusinessIdentifier`
    /// when the manifest package id is already known.
    async fn save(&self, package: &ImportPackage) -> Result<(), IntakeError>;

    async fn update(&self, package: &ImportPackage) -> Result<(), IntakeError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ImportPackage>, IntakeError>;

    /// Lookup by the manifest-assigned package identity (idempotency key).
    async fn find_by_package_id(&self, package_id: Uuid) -> Result<Option<ImportPackage>, IntakeError>;

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<ImportPackage>, IntakeError>;
}

/// Store of staging rows, one logical table per entity type.
#[async_trait]
pub trait StagingRepository: Send + Sync {
    async fn insert_rows(&self, rows: &[StagingRow]) -> Result<(), IntakeError>;

    /// Deletes every staging row of every type for a package. Returns the
    /// number of rows removed.
    async fn delete_for_package(&self, import_package_id: Uuid) -> Result<u64, IntakeError>;

    /// All rows of one type for a package, ordered by original entity id.
    async fn rows_for_package(
        &self,
        import_package_id: Uuid,
        kind: EntityKind,
    ) -> Result<Vec<StagingRow>, IntakeError>;

    async fn find_row(
        &self,
        import_package_id: Uuid,
        kind: EntityKind,
        original_entity_id: Uuid,
    ) -> Result<Option<StagingRow>, IntakeError>;

    /// Persists validation status, diagnostics, approval flag, and the
    /// committed entity id of one row.
    async fn update_row(&self, row: &StagingRow) -> Result<(), IntakeError>;
}

/// Store of conflict records and suppression markers.
#[async_trait]
pub trait ConflictRepository: Send + Sync {
    async fn insert(&self, conflict: &ConflictResolution) -> Result<(), IntakeError>;

    async fn update(&self, conflict: &ConflictResolution) -> Result<(), IntakeError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ConflictResolution>, IntakeError>;

    async fn list_for_package(&self, import_package_id: Uuid)
        -> Result<Vec<ConflictResolution>, IntakeError>;

    async fn unresolved_count(&self, import_package_id: Uuid) -> Result<u64, IntakeError>;

    async fn delete_for_package(&self, import_package_id: Uuid) -> Result<u64, IntakeError>;

    /// Whether a keep-separate decision for this (detection key, production
    /// candidate) pair was recorded by an earlier package.
    async fn is_suppressed(
        &self,
        entity_type: ConflictEntityType,
        detection_key: &Sha256Checksum,
        production_id: Uuid,
    ) -> Result<bool, IntakeError>;

    async fn record_suppression(
        &self,
        entity_type: ConflictEntityType,
        detection_key: &Sha256Checksum,
        production_id: Uuid,
    ) -> Result<(), IntakeError>;
}

/// A production person with its identity.
#[derive(Debug, Clone)]
pub struct ProductionPerson {
    pub id: Uuid,
    pub record: PersonRecord,
}

/// A production property unit with its identity.
#[derive(Debug, Clone)]
pub struct ProductionUnit {
    pub id: Uuid,
    pub record: PropertyUnitRecord,
}

/// Read-side access to production used by duplicate detection and the
/// cross-package uniqueness checks. Readers use a consistent snapshot and
/// never block production writers.
#[async_trait]
pub trait ProductionReader: Send + Sync {
    async fn persons_by_national_id(&self, national_id: &str)
        -> Result<Vec<ProductionPerson>, IntakeError>;

    /// Blocking-key candidates: same birth year, same gender, same first
    /// three letters of the normalized family name.
    async fn persons_by_blocking_key(
        &self,
        birth_year: i32,
        gender: &str,
        family_prefix: &str,
    ) -> Result<Vec<ProductionPerson>, IntakeError>;

    /// The production building with this 17-digit code, if any.
    async fn building_by_code(&self, building_code: &str) -> Result<Option<Uuid>, IntakeError>;

    /// All production units belonging to the building with this code.
    async fn units_for_building_code(&self, building_code: &str)
        -> Result<Vec<ProductionUnit>, IntakeError>;

    /// Whether a national id is already registered within a governorate.
    async fn national_id_exists(
        &self,
        national_id: &str,
        governorate_code: Option<&str>,
    ) -> Result<bool, IntakeError>;
}
