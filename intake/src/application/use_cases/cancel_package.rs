// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cancel Package Use Case
//!
//! Cancellation is accepted in any non-terminal status and is idempotent:
//! a second cancel returns success without touching the recorded reason.
//! When a stage is running, the request flags the stage's lock entry and
//! takes effect at the stage's next suspension point instead of failing
//! with `PackageBusy`. Staging cleanup is best-effort: failure to delete
//! staging rows is a warning, never an error.

use std::sync::Arc;
use tracing::{info, warn};

use tenure_intake_domain::entities::PackageStatus;
use tenure_intake_domain::services::ports::AuditEntry;
use tenure_intake_domain::IntakeError;

use crate::application::commands::{CancelPackageCommand, OperationOutcome};
use crate::application::services::intake_service::IntakeDeps;

pub struct CancelPackageUseCase {
    deps: Arc<IntakeDeps>,
}

impl CancelPackageUseCase {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        command: CancelPackageCommand,
    ) -> Result<OperationOutcome<()>, IntakeError> {
        let user_id = command
            .user_id
            .ok_or_else(|| IntakeError::NotAuthenticated("cancellation requires a user".to_string()))?;
        let deps = &self.deps;
        let mut package = deps
            .packages
            .find_by_id(command.package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", command.package_id)))?;

        let guard = match deps.locks.acquire(package.id(), "cancel") {
            Ok(guard) => guard,
            Err(IntakeError::PackageBusy(_)) => {
                // A stage is running; it observes the flag at its next
                // suspension point and aborts there.
                deps.locks.request_cancel(package.id());
                info!(package = %package.package_id(), "cancellation requested for running stage");
                return Ok(OperationOutcome {
                    success: true,
                    package: (&package).into(),
                    report: None,
                    errors: Vec::new(),
                    warnings: vec![
                        "a stage is in progress; cancellation takes effect at its next suspension point"
                            .to_string(),
                    ],
                });
            }
            Err(e) => return Err(e),
        };
        let _guard = guard;

        // Idempotent: an already-cancelled package succeeds unchanged.
        if package.status() == PackageStatus::Cancelled {
            return Ok(OperationOutcome::ok(&package, ()));
        }

        package.cancel(&command.reason, deps.clock.now_utc())?;
        deps.packages.update(&package).await?;

        let mut warnings = Vec::new();
        if command.cleanup_staging {
            match deps.staging.delete_for_package(package.id()).await {
                Ok(removed) => info!(package = %package.package_id(), removed, "staging cleaned up"),
                Err(e) => {
                    warn!(package = %package.package_id(), error = %e, "staging cleanup failed");
                    warnings.push(format!("staging cleanup failed: {}", e));
                }
            }
            match deps.conflicts.delete_for_package(package.id()).await {
                Ok(_) => {}
                Err(e) => {
                    warn!(package = %package.package_id(), error = %e, "conflict cleanup failed");
                    warnings.push(format!("conflict cleanup failed: {}", e));
                }
            }
        }

        deps.audit
            .log(
                AuditEntry::new("package-cancelled", "import-package", package.id())
                    .by(Some(user_id))
                    .with_new_value(serde_json::json!({
                        "reason": command.reason,
                        "cleanup_staging": command.cleanup_staging,
                    })),
            )
            .await;
        info!(package = %package.package_id(), reason = command.reason.as_str(), "package cancelled");
        Ok(OperationOutcome::ok(&package, ()).with_warnings(warnings))
    }
}
