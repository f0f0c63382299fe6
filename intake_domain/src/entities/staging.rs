// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staging Rows
//!
//! Per-package isolated copies of archive rows awaiting validation,
//! duplicate detection, and commit. Each staging row preserves the entity's
//! original UUID; `(import_package_id, original_entity_id)` is unique per
//! entity type, and `committed_entity_id` is write-once.
//!
//! The payload is held as a JSON value rather than a typed record so that
//! one repository contract serves all ten entity types; stages that need the
//! business fields deserialize through [`StagingRow::payload_as`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::Diagnostic;
use crate::IntakeError;

/// The ten entity types a package can carry, in dependency (load and commit)
/// order: parents before children so foreign keys always resolve forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Building,
    PropertyUnit,
    Person,
    Household,
    PersonPropertyRelation,
    Evidence,
    Survey,
    Claim,
    Document,
    Referral,
}

impl EntityKind {
    /// Topological order used by both the staging loader and the commit
    /// engine.
    pub const DEPENDENCY_ORDER: [EntityKind; 10] = [
        EntityKind::Building,
        EntityKind::PropertyUnit,
        EntityKind::Person,
        EntityKind::Household,
        EntityKind::PersonPropertyRelation,
        EntityKind::Evidence,
        EntityKind::Survey,
        EntityKind::Claim,
        EntityKind::Document,
        EntityKind::Referral,
    ];

    /// Archive table name inside a `.uhc` container.
    pub fn archive_table(&self) -> &'static str {
        match self {
            EntityKind::Building => "buildings",
            EntityKind::PropertyUnit => "property_units",
            EntityKind::Person => "persons",
            EntityKind::Household => "households",
            EntityKind::PersonPropertyRelation => "person_property_relations",
            EntityKind::Evidence => "evidences",
            EntityKind::Survey => "surveys",
            EntityKind::Claim => "claims",
            EntityKind::Document => "documents",
            EntityKind::Referral => "referrals",
        }
    }

    pub fn staging_table(&self) -> &'static str {
        match self {
            EntityKind::Building => "staging_buildings",
            EntityKind::PropertyUnit => "staging_property_units",
            EntityKind::Person => "staging_persons",
            EntityKind::Household => "staging_households",
            EntityKind::PersonPropertyRelation => "staging_person_property_relations",
            EntityKind::Evidence => "staging_evidences",
            EntityKind::Survey => "staging_surveys",
            EntityKind::Claim => "staging_claims",
            EntityKind::Document => "staging_documents",
            EntityKind::Referral => "staging_referrals",
        }
    }

    pub fn production_table(&self) -> &'static str {
        match self {
            EntityKind::Building => "production_buildings",
            EntityKind::PropertyUnit => "production_property_units",
            EntityKind::Person => "production_persons",
            EntityKind::Household => "production_households",
            EntityKind::PersonPropertyRelation => "production_person_property_relations",
            EntityKind::Evidence => "production_evidences",
            EntityKind::Survey => "production_surveys",
            EntityKind::Claim => "production_claims",
            EntityKind::Document => "production_documents",
            EntityKind::Referral => "production_referrals",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.archive_table())
    }
}

impl FromStr for EntityKind {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::DEPENDENCY_ORDER
            .iter()
            .copied()
            .find(|k| k.archive_table() == s)
            .ok_or_else(|| IntakeError::InternalError(format!("unknown entity kind {:?}", s)))
    }
}

/// Validation outcome of one staging row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Pending,
    Valid,
    Invalid,
    Warning,
    /// Excluded from commit by a conflict decision (merge or link); the row
    /// resolved to an existing production entity instead.
    Skipped,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Skipped => "skipped",
        }
    }
}

impl Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ValidationStatus::Pending),
            "valid" => Ok(ValidationStatus::Valid),
            "invalid" => Ok(ValidationStatus::Invalid),
            "warning" => Ok(ValidationStatus::Warning),
            "skipped" => Ok(ValidationStatus::Skipped),
            other => Err(IntakeError::InternalError(format!("unknown validation status {:?}", other))),
        }
    }
}

/// One staged archive row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRow {
    pub id: Uuid,
    pub import_package_id: Uuid,
    pub kind: EntityKind,
    /// The UUID this entity had inside the archive.
    pub original_entity_id: Uuid,
    /// Business fields, serialized from the matching record type.
    pub payload: serde_json::Value,
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<Diagnostic>,
    pub validation_warnings: Vec<Diagnostic>,
    pub is_approved_for_commit: bool,
    /// Production id this row resolved to, set exactly once - either by the
    /// commit engine or by a merge / link-existing decision.
    pub committed_entity_id: Option<Uuid>,
}

impl StagingRow {
    pub fn new(
        import_package_id: Uuid,
        kind: EntityKind,
        original_entity_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        StagingRow {
            id: Uuid::new_v4(),
            import_package_id,
            kind,
            original_entity_id,
            payload,
            validation_status: ValidationStatus::Pending,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
            is_approved_for_commit: false,
            committed_entity_id: None,
        }
    }

    /// Deserializes the payload into its typed record.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, IntakeError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            IntakeError::SerializationError(format!(
                "staging {} {}: {}",
                self.kind, self.original_entity_id, e
            ))
        })
    }

    /// Records the production identity this row resolved to. Write-once: a
    /// staging row may be committed (or merged away) only one time.
    pub fn record_committed(&mut self, production_id: Uuid) -> Result<(), IntakeError> {
        if let Some(existing) = self.committed_entity_id {
            return Err(IntakeError::InternalError(format!(
                "staging row {} already committed to {}",
                self.original_entity_id, existing
            )));
        }
        self.committed_entity_id = Some(production_id);
        Ok(())
    }

    /// Applies validator output, folding severities into a row status.
    pub fn apply_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            diagnostics.into_iter().partition(|d| d.is_blocking());
        self.validation_status = if !errors.is_empty() {
            ValidationStatus::Invalid
        } else if !warnings.is_empty() {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Valid
        };
        self.is_approved_for_commit = errors.is_empty();
        self.validation_errors = errors;
        self.validation_warnings = warnings;
    }

    /// Marks the row excluded from commit in favor of an existing production
    /// entity (merge / link-existing decisions).
    pub fn mark_skipped(&mut self, production_id: Uuid) -> Result<(), IntakeError> {
        self.record_committed(production_id)?;
        self.validation_status = ValidationStatus::Skipped;
        self.is_approved_for_commit = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Diagnostic;

    fn row() -> StagingRow {
        StagingRow::new(
            Uuid::new_v4(),
            EntityKind::Person,
            Uuid::new_v4(),
            serde_json::json!({"first_name": "x"}),
        )
    }

    #[test]
    fn test_dependency_order_is_complete() {
        assert_eq!(EntityKind::DEPENDENCY_ORDER.len(), 10);
        assert_eq!(EntityKind::DEPENDENCY_ORDER[0], EntityKind::Building);
        assert_eq!(EntityKind::DEPENDENCY_ORDER[9], EntityKind::Referral);
    }

    #[test]
    fn test_kind_round_trips_through_table_name() {
        for kind in EntityKind::DEPENDENCY_ORDER {
            assert_eq!(kind.archive_table().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_committed_entity_id_is_write_once() {
        let mut r = row();
        let first = Uuid::new_v4();
        r.record_committed(first).unwrap();
        assert!(r.record_committed(Uuid::new_v4()).is_err());
        assert_eq!(r.committed_entity_id, Some(first));
    }

    #[test]
    fn test_apply_diagnostics_folds_severity() {
        let mut r = row();
        r.apply_diagnostics(vec![Diagnostic::advisory("a", "p", "m")]);
        assert_eq!(r.validation_status, ValidationStatus::Warning);
        assert!(r.is_approved_for_commit);

        let mut r = row();
        r.apply_diagnostics(vec![
            Diagnostic::advisory("a", "p", "m"),
            Diagnostic::blocking("b", "p", "m"),
        ]);
        assert_eq!(r.validation_status, ValidationStatus::Invalid);
        assert!(!r.is_approved_for_commit);

        let mut r = row();
        r.apply_diagnostics(Vec::new());
        assert_eq!(r.validation_status, ValidationStatus::Valid);
    }

    #[test]
    fn test_mark_skipped_sets_status_and_mapping() {
        let mut r = row();
        let master = Uuid::new_v4();
        r.mark_skipped(master).unwrap();
        assert_eq!(r.validation_status, ValidationStatus::Skipped);
        assert_eq!(r.committed_entity_id, Some(master));
        assert!(!r.is_approved_for_commit);
        assert!(r.mark_skipped(Uuid::new_v4()).is_err());
    }
}
