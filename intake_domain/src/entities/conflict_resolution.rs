// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Conflict Resolution
//!
//! A `ConflictResolution` records one candidate duplicate pair between a
//! staging row and production, awaiting a human decision. Decisions are
//! terminal: once a reviewer has decided, a second resolve attempt fails
//! with `ConflictAlreadyResolved`. Every decided conflict carries a
//! mandatory justification and, for merges, a JSON audit trail of the
//! foreign-key repointing that was performed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::Sha256Checksum;
use crate::IntakeError;

/// Entity types duplicate detection operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictEntityType {
    Person,
    Building,
    PropertyUnit,
}

impl Display for ConflictEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConflictEntityType::Person => "person",
            ConflictEntityType::Building => "building",
            ConflictEntityType::PropertyUnit => "property-unit",
        };
        f.write_str(text)
    }
}

impl FromStr for ConflictEntityType {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(ConflictEntityType::Person),
            "building" => Ok(ConflictEntityType::Building),
            "property-unit" => Ok(ConflictEntityType::PropertyUnit),
            other => Err(IntakeError::InternalError(format!(
                "unknown conflict entity type {:?}",
                other
            ))),
        }
    }
}

/// Reviewer decision on a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictDecision {
    Unresolved,
    /// Discard the staging identity; fold its data and references into the
    /// chosen production master.
    Merge,
    /// Keep the production row untouched; the staging row resolves to it.
    LinkToExisting,
    /// Commit the staging row as a new production entity despite the match.
    KeepSeparate,
    /// Same outcome as `KeepSeparate`; kept distinct for audit clarity.
    CreateNew,
}

impl ConflictDecision {
    pub fn requires_master(&self) -> bool {
        matches!(self, ConflictDecision::Merge | ConflictDecision::LinkToExisting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictDecision::Unresolved => "unresolved",
            ConflictDecision::Merge => "merge",
            ConflictDecision::LinkToExisting => "link-to-existing",
            ConflictDecision::KeepSeparate => "keep-separate",
            ConflictDecision::CreateNew => "create-new",
        }
    }
}

impl Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictDecision {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unresolved" => Ok(ConflictDecision::Unresolved),
            "merge" => Ok(ConflictDecision::Merge),
            "link-to-existing" => Ok(ConflictDecision::LinkToExisting),
            "keep-separate" => Ok(ConflictDecision::KeepSeparate),
            "create-new" => Ok(ConflictDecision::CreateNew),
            other => Err(IntakeError::InternalError(format!("unknown decision {:?}", other))),
        }
    }
}

/// One production candidate surfaced by detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub production_id: Uuid,
    /// Similarity score 0-100.
    pub score: u8,
    /// Short human-readable description of the candidate (name, code, ...).
    pub summary: String,
}

/// A candidate duplicate pair requiring a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    id: Uuid,
    import_package_id: Uuid,
    entity_type: ConflictEntityType,
    staging_original_id: Uuid,
    /// Hash of the staging side's identifying fields at detection time.
    /// Keep-separate decisions record suppressions under this key; editing
    /// any identifying field changes the key and re-enables detection.
    detection_key: Sha256Checksum,
    /// All candidates at or above the listing threshold, best first.
    candidates: Vec<DuplicateCandidate>,
    suggested_master_id: Uuid,
    /// Score of the best candidate.
    similarity_score: u8,
    decision: ConflictDecision,
    chosen_master_id: Option<Uuid>,
    resolved_by: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    justification: Option<String>,
    /// Audit trail of FK repointing performed by a merge.
    repointing_audit: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl ConflictResolution {
    /// Creates an unresolved conflict. Candidates must be sorted best-first
    /// and non-empty; the first one becomes the suggested master.
    pub fn detect(
        import_package_id: Uuid,
        entity_type: ConflictEntityType,
        staging_original_id: Uuid,
        detection_key: Sha256Checksum,
        candidates: Vec<DuplicateCandidate>,
        now: DateTime<Utc>,
    ) -> Result<Self, IntakeError> {
        let best = candidates.first().ok_or_else(|| {
            IntakeError::InternalError("conflict requires at least one candidate".to_string())
        })?;
        Ok(ConflictResolution {
            id: Uuid::new_v4(),
            import_package_id,
            entity_type,
            staging_original_id,
            detection_key,
            suggested_master_id: best.production_id,
            similarity_score: best.score,
            candidates,
            decision: ConflictDecision::Unresolved,
            chosen_master_id: None,
            resolved_by: None,
            resolved_at: None,
            justification: None,
            repointing_audit: None,
            created_at: now,
        })
    }

    /// Applies a terminal decision. Fails if the conflict was already
    /// decided, if the justification is empty, or if a merge/link decision
    /// does not name a master.
    pub fn decide(
        &mut self,
        decision: ConflictDecision,
        chosen_master_id: Option<Uuid>,
        reviewer: Uuid,
        justification: &str,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        if self.decision != ConflictDecision::Unresolved {
            return Err(IntakeError::ConflictAlreadyResolved(format!(
                "conflict {} already decided as {}",
                self.id, self.decision
            )));
        }
        if decision == ConflictDecision::Unresolved {
            return Err(IntakeError::InvalidConfiguration(
                "cannot resolve a conflict back to unresolved".to_string(),
            ));
        }
        if justification.trim().is_empty() {
            return Err(IntakeError::ValidationFailed(
                "a justification is required for every conflict decision".to_string(),
            ));
        }
        if decision.requires_master() && chosen_master_id.is_none() {
            return Err(IntakeError::ValidationFailed(format!(
                "decision {} requires a master entity id",
                decision
            )));
        }
        self.decision = decision;
        self.chosen_master_id = chosen_master_id;
        self.resolved_by = Some(reviewer);
        self.resolved_at = Some(now);
        self.justification = Some(justification.trim().to_string());
        Ok(())
    }

    pub fn attach_repointing_audit(&mut self, audit: serde_json::Value) {
        self.repointing_audit = Some(audit);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn import_package_id(&self) -> Uuid {
        self.import_package_id
    }

    pub fn entity_type(&self) -> ConflictEntityType {
        self.entity_type
    }

    pub fn staging_original_id(&self) -> Uuid {
        self.staging_original_id
    }

    pub fn detection_key(&self) -> &Sha256Checksum {
        &self.detection_key
    }

    pub fn candidates(&self) -> &[DuplicateCandidate] {
        &self.candidates
    }

    pub fn suggested_master_id(&self) -> Uuid {
        self.suggested_master_id
    }

    pub fn similarity_score(&self) -> u8 {
        self.similarity_score
    }

    pub fn decision(&self) -> ConflictDecision {
        self.decision
    }

    pub fn is_resolved(&self) -> bool {
        self.decision != ConflictDecision::Unresolved
    }

    pub fn chosen_master_id(&self) -> Option<Uuid> {
        self.chosen_master_id
    }

    pub fn resolved_by(&self) -> Option<Uuid> {
        self.resolved_by
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn justification(&self) -> Option<&str> {
        self.justification.as_deref()
    }

    pub fn repointing_audit(&self) -> Option<&serde_json::Value> {
        self.repointing_audit.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> ConflictResolution {
        ConflictResolution::detect(
            Uuid::new_v4(),
            ConflictEntityType::Person,
            Uuid::new_v4(),
            Sha256Checksum::from_bytes(b"detection-key"),
            vec![
                DuplicateCandidate {
                    production_id: Uuid::new_v4(),
                    score: 87,
                    summary: "أحمد محمد".to_string(),
                },
                DuplicateCandidate {
                    production_id: Uuid::new_v4(),
                    score: 61,
                    summary: "احمد محمود".to_string(),
                },
            ],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_detect_uses_best_candidate() {
        let c = conflict();
        assert_eq!(c.similarity_score(), 87);
        assert_eq!(c.suggested_master_id(), c.candidates()[0].production_id);
        assert!(!c.is_resolved());
    }

    #[test]
    fn test_decision_is_write_once() {
        let mut c = conflict();
        let master = c.suggested_master_id();
        c.decide(ConflictDecision::Merge, Some(master), Uuid::new_v4(), "same person", Utc::now())
            .unwrap();
        let err = c
            .decide(ConflictDecision::KeepSeparate, None, Uuid::new_v4(), "changed my mind", Utc::now())
            .unwrap_err();
        assert!(matches!(err, IntakeError::ConflictAlreadyResolved(_)));
        assert_eq!(c.decision(), ConflictDecision::Merge);
    }

    #[test]
    fn test_justification_is_mandatory() {
        let mut c = conflict();
        let err = c
            .decide(ConflictDecision::KeepSeparate, None, Uuid::new_v4(), "  ", Utc::now())
            .unwrap_err();
        assert!(matches!(err, IntakeError::ValidationFailed(_)));
        assert!(!c.is_resolved());
    }

    #[test]
    fn test_merge_requires_master() {
        let mut c = conflict();
        let err = c
            .decide(ConflictDecision::Merge, None, Uuid::new_v4(), "same person", Utc::now())
            .unwrap_err();
        assert!(matches!(err, IntakeError::ValidationFailed(_)));
    }
}
