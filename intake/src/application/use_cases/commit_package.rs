// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Commit Package Use Case
//!
//! Gates and drives the commit engine. Preconditions: the package is
//! `ReadyToCommit` (or `CommitFailed`, for a retry) and every conflict is
//! resolved. The engine's transaction either promotes everything or
//! nothing; this use case translates the outcome onto the package:
//!
//! - success + archived → `Completed`
//! - success + archival failure → `PartiallyCompleted` (data is live)
//! - engine error → rollback already happened, `CommitFailed` with the
//!   error recorded
//! - cancellation observed mid-commit → rollback, `Cancelled`

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::ConflictDecision;
use tenure_intake_domain::entities::{CommitReport, PackageStatus};
use tenure_intake_domain::services::ports::AuditEntry;
use tenure_intake_domain::IntakeError;

use crate::application::commands::OperationOutcome;
use crate::application::services::intake_service::IntakeDeps;

pub struct CommitPackageUseCase {
    deps: Arc<IntakeDeps>,
}

impl CommitPackageUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<CommitReport>, IntakeError> {
        let user_id = user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("commit requires a user".to_string()))?;
        let deps = &self.deps;
        let mut package = deps
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", package_id)))?;
        let guard = deps.locks.acquire(package.id(), "commit")?;

        if package.status() == PackageStatus::ReviewingConflicts {
            return Err(IntakeError::ConflictUnresolved(format!(
                "package {} has open conflicts awaiting review",
                package.package_id()
            )));
        }
        if !matches!(
            package.status(),
            PackageStatus::ReadyToCommit | PackageStatus::CommitFailed
        ) {
            return Err(IntakeError::state_transition(format!(
                "package {} cannot be committed from {}",
                package.package_id(),
                package.status()
            )));
        }
        let unresolved = deps.conflicts.unresolved_count(package.id()).await?;
        if unresolved > 0 {
            return Err(IntakeError::ConflictUnresolved(format!(
                "package {} still has {} unresolved conflicts",
                package.package_id(),
                unresolved
            )));
        }

        package.begin_commit(deps.clock.now_utc())?;
        deps.packages.update(&package).await?;

        match deps.commit_engine.promote(&package, &guard).await {
            Ok(mut report) => {
                report.merges_performed = deps
                    .conflicts
                    .list_for_package(package.id())
                    .await?
                    .iter()
                    .filter(|c| c.decision() == ConflictDecision::Merge)
                    .count() as u64;

                let now = deps.clock.now_utc();
                let committed = report.committed_total();
                let failed = report.failed_total();
                let skipped = report.skipped_total();
                match (&report.archive_path, &report.archive_error) {
                    (Some(path), _) => {
                        package.complete_commit(committed, failed, skipped, now)?;
                        package.mark_archived(path.clone(), now);
                    }
                    (None, Some(archive_error)) => {
                        package.complete_commit_partial(
                            committed,
                            failed,
                            skipped,
                            format!("archival failed: {}", archive_error),
                            now,
                        )?;
                    }
                    (None, None) => {
                        package.complete_commit(committed, failed, skipped, now)?;
                    }
                }
                deps.packages.update(&package).await?;

                deps.audit
                    .log(
                        AuditEntry::new("package-committed", "import-package", package.id())
                            .by(Some(user_id))
                            .with_new_value(serde_json::json!({
                                "status": package.status().as_str(),
                                "committed": committed,
                                "skipped": skipped,
                                "merges": report.merges_performed,
                                "dedup_bytes_saved": report.deduplication_bytes_saved,
                            })),
                    )
                    .await;
                info!(
                    package = %package.package_id(),
                    status = package.status().as_str(),
                    committed,
                    "commit finished"
                );
                Ok(OperationOutcome::ok(&package, report))
            }
            Err(IntakeError::Cancelled(reason)) => {
                // The engine aborted before its transaction committed.
                package.cancel(&reason, deps.clock.now_utc())?;
                deps.packages.update(&package).await?;
                Ok(OperationOutcome::failed(&package, vec![reason]))
            }
            Err(e) => {
                error!(package = %package.package_id(), error = %e, "commit failed");
                package.fail_commit(e.to_string(), deps.clock.now_utc())?;
                deps.packages.update(&package).await?;
                deps.audit
                    .log(
                        AuditEntry::new("package-commit-failed", "import-package", package.id())
                            .by(Some(user_id))
                            .with_new_value(serde_json::json!({ "error": e.to_string() })),
                    )
                    .await;
                Err(e)
            }
        }
    }
}
