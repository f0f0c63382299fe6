// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resolve Conflict Use Case
//!
//! Applies one reviewer decision to an open conflict. Decisions are
//! terminal; re-resolving fails with `ConflictAlreadyResolved`. Merges and
//! link-existing run through the merge engine inside their own transaction;
//! keep-separate and create-new record suppression markers so later
//! packages do not re-surface the same pair while detection keys are
//! unchanged. When the last conflict resolves, the package advances to
//! `ReadyToCommit`.

use std::sync::Arc;
use tracing::info;

use tenure_intake_domain::entities::conflict_resolution::{ConflictDecision, ConflictEntityType};
use tenure_intake_domain::entities::staging::EntityKind;
use tenure_intake_domain::entities::PackageStatus;
use tenure_intake_domain::services::ports::AuditEntry;
use tenure_intake_domain::IntakeError;

use crate::application::commands::{ConflictView, OperationOutcome, ResolveConflictCommand};
use crate::application::services::intake_service::IntakeDeps;

fn staging_kind(entity_type: ConflictEntityType) -> EntityKind {
    match entity_type {
        ConflictEntityType::Person => EntityKind::Person,
        ConflictEntityType::Building => EntityKind::Building,
        ConflictEntityType::PropertyUnit => EntityKind::PropertyUnit,
    }
}

pub struct ResolveConflictUseCase {
    deps: Arc<IntakeDeps>,
}

impl ResolveConflictUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        command: ResolveConflictCommand,
    ) -> Result<OperationOutcome<ConflictView>, IntakeError> {
        let user_id = command
            .user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("conflict resolution requires a user".to_string()))?;
        let deps = &self.deps;

        let mut conflict = deps
            .conflicts
            .find_by_id(command.conflict_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("conflict {}", command.conflict_id)))?;
        let mut package = deps
            .packages
            .find_by_id(conflict.import_package_id())
            .await?
            .ok_or_else(|| {
                IntakeError::NotFound(format!("import package {}", conflict.import_package_id()))
            })?;
        let _guard = deps.locks.acquire(package.id(), "resolve-conflict")?;

        if package.status() != PackageStatus::ReviewingConflicts {
            return Err(IntakeError::state_transition(format!(
                "package {} is not reviewing conflicts ({})",
                package.package_id(),
                package.status()
            )));
        }

        let now = deps.clock.now_utc();
        // Validates write-once, justification, and master requirements
        // before any side effect runs.
        conflict.decide(
            command.decision,
            command.chosen_master_id,
            user_id,
            &command.justification,
            now,
        )?;

        let kind = staging_kind(conflict.entity_type());
        let mut staging_row = deps
            .staging
            .find_row(package.id(), kind, conflict.staging_original_id())
            .await?
            .ok_or_else(|| {
                IntakeError::NotFound(format!(
                    "staging {} {} for conflict {}",
                    kind,
                    conflict.staging_original_id(),
                    conflict.id()
                ))
            })?;

        match command.decision {
            ConflictDecision::Merge => {
                let master = conflict.chosen_master_id().ok_or_else(|| {
                    IntakeError::internal("merge decision accepted without a master id")
                })?;
                let audit = deps
                    .merge_engine
                    .merge(conflict.entity_type(), &mut staging_row, master)
                    .await?;
                conflict.attach_repointing_audit(audit);
            }
            ConflictDecision::LinkToExisting => {
                let master = conflict.chosen_master_id().ok_or_else(|| {
                    IntakeError::internal("link decision accepted without a master id")
                })?;
                deps.merge_engine.link_existing(&mut staging_row, master).await?;
            }
            ConflictDecision::KeepSeparate | ConflictDecision::CreateNew => {
                // The staging row stays committable as a new production
                // entity; remember the reviewed pairs so the next package
                // does not re-surface them.
                for candidate in conflict.candidates() {
                    deps.conflicts
                        .record_suppression(
                            conflict.entity_type(),
                            conflict.detection_key(),
                            candidate.production_id,
                        )
                        .await?;
                }
            }
            ConflictDecision::Unresolved => {
                return Err(IntakeError::internal("decide() accepted an unresolved decision"));
            }
        }

        deps.conflicts.update(&conflict).await?;
        let unresolved = deps.conflicts.unresolved_count(package.id()).await?;
        package.record_conflict_progress(unresolved, now)?;
        deps.packages.update(&package).await?;

        deps.audit
            .log(
                AuditEntry::new("conflict-resolved", "conflict-resolution", conflict.id())
                    .by(Some(user_id))
                    .with_new_value(serde_json::json!({
                        "decision": conflict.decision().as_str(),
                        "chosen_master_id": conflict.chosen_master_id(),
                        "unresolved_remaining": unresolved,
                    }))
                    .with_changed_fields(vec!["decision".to_string()]),
            )
            .await;
        info!(
            conflict = %conflict.id(),
            decision = conflict.decision().as_str(),
            unresolved_remaining = unresolved,
            "conflict resolved"
        );
        Ok(OperationOutcome::ok(&package, ConflictView::from(&conflict)))
    }
}
