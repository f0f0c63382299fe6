// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Read-side queries: package snapshots, staged entities grouped by type,
//! and conflict listings. No locks, no mutations.

use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use tenure_intake_domain::entities::staging::EntityKind;
use tenure_intake_domain::IntakeError;

use crate::application::commands::{ConflictView, PackageSnapshot, StagedEntityView};
use crate::application::services::intake_service::IntakeDeps;

pub struct IntakeQueries {
    deps: Arc<IntakeDeps>,
}

impl IntakeQueries {
    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        Self { deps }
    }

    pub async fn package(&self, id: Uuid) -> Result<PackageSnapshot, IntakeError> {
        let package = self
            .deps
            .packages
            .find_by_id(id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", id)))?;
        Ok((&package).into())
    }

    pub async fn packages(&self, offset: u32, limit: u32) -> Result<Vec<PackageSnapshot>, IntakeError> {
        let packages = self.deps.packages.list(offset, limit).await?;
        Ok(packages.iter().map(PackageSnapshot::from).collect())
    }

    /// Staged rows grouped by archive table name, in dependency order.
    pub async fn staged_entities(
        &self,
        package_id: Uuid,
    ) -> Result<BTreeMap<String, Vec<StagedEntityView>>, IntakeError> {
        let package = self
            .deps
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", package_id)))?;

        let mut grouped = BTreeMap::new();
        for kind in EntityKind::DEPENDENCY_ORDER {
            let rows = self.deps.staging.rows_for_package(package.id(), kind).await?;
            if rows.is_empty() {
                continue;
            }
            grouped.insert(
                kind.archive_table().to_string(),
                rows.iter().map(StagedEntityView::from).collect(),
            );
        }
        Ok(grouped)
    }

    pub async fn conflicts(&self, package_id: Uuid) -> Result<Vec<ConflictView>, IntakeError> {
        let package = self
            .deps
            .packages
            .find_by_id(package_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("import package {}", package_id)))?;
        let conflicts = self.deps.conflicts.list_for_package(package.id()).await?;
        Ok(conflicts.iter().map(ConflictView::from).collect())
    }
}
