// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Merge Engine
//!
//! Executes merge and link-existing conflict decisions. A merge discards a
//! staging identity in favor of an existing production master:
//!
//! 1. field reconciliation - master fields win, empty master fields are
//!    filled from the staging row;
//! 2. foreign-key repointing - every production row that already references
//!    the staging entity's original id (possible when an earlier package
//!    committed that identity) is rewritten to the master id; repointing is
//!    idempotent;
//! 3. the staging row is marked `Skipped` with `committed_entity_id` set to
//!    the master, which seeds the commit engine's id map.
//!
//! All of it happens in one writable transaction per decision. Merges
//! change only FK columns on referring rows; nothing cascades. Each entity
//! variant enumerates the closed set of tables it repoints:
//!
//! - **Person**: person-property relations, household heads, claim
//!   claimants, evidences, certificate beneficiaries
//! - **Building**: surveys, property units
//! - **PropertyUnit**: claims, person-property relations

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::ConflictEntityType;
use tenure_intake_domain::entities::records::{BuildingRecord, PersonRecord, PropertyUnitRecord};
use tenure_intake_domain::entities::staging::StagingRow;
use tenure_intake_domain::services::name_matching::family_name_prefix;
use tenure_intake_domain::IntakeError;

pub struct MergeEngine {
    pool: SqlitePool,
}

/// Fills empty master fields from the staging record, returning the names
/// of the fields that were filled. Master values always win.
fn reconcile_person(master: &mut PersonRecord, staged: &PersonRecord) -> Vec<String> {
    let mut filled = Vec::new();
    if master.father_name.is_none() && staged.father_name.is_some() {
        master.father_name = staged.father_name.clone();
        filled.push("father_name".to_string());
    }
    if master.national_id.is_none() && staged.national_id.is_some() {
        master.national_id = staged.national_id.clone();
        filled.push("national_id".to_string());
    }
    if master.date_of_birth.is_none() && staged.date_of_birth.is_some() {
        master.date_of_birth = staged.date_of_birth;
        filled.push("date_of_birth".to_string());
    }
    if master.gender.is_none() && staged.gender.is_some() {
        master.gender = staged.gender;
        filled.push("gender".to_string());
    }
    if master.phone_number.is_none() && staged.phone_number.is_some() {
        master.phone_number = staged.phone_number.clone();
        filled.push("phone_number".to_string());
    }
    if master.nationality.is_none() && staged.nationality.is_some() {
        master.nationality = staged.nationality.clone();
        filled.push("nationality".to_string());
    }
    if master.governorate_code.is_none() && staged.governorate_code.is_some() {
        master.governorate_code = staged.governorate_code.clone();
        filled.push("governorate_code".to_string());
    }
    filled
}

fn reconcile_building(master: &mut BuildingRecord, staged: &BuildingRecord) -> Vec<String> {
    let mut filled = Vec::new();
    if master.building_type.is_none() && staged.building_type.is_some() {
        master.building_type = staged.building_type.clone();
        filled.push("building_type".to_string());
    }
    if master.number_of_floors.is_none() && staged.number_of_floors.is_some() {
        master.number_of_floors = staged.number_of_floors;
        filled.push("number_of_floors".to_string());
    }
    if master.number_of_units.is_none() && staged.number_of_units.is_some() {
        master.number_of_units = staged.number_of_units;
        filled.push("number_of_units".to_string());
    }
    if master.address_text.is_none() && staged.address_text.is_some() {
        master.address_text = staged.address_text.clone();
        filled.push("address_text".to_string());
    }
    filled
}

fn reconcile_unit(master: &mut PropertyUnitRecord, staged: &PropertyUnitRecord) -> Vec<String> {
    let mut filled = Vec::new();
    if master.unit_type.is_none() && staged.unit_type.is_some() {
        master.unit_type = staged.unit_type.clone();
        filled.push("unit_type".to_string());
    }
    if master.floor_number.is_none() && staged.floor_number.is_some() {
        master.floor_number = staged.floor_number;
        filled.push("floor_number".to_string());
    }
    if master.area_square_meters.is_none() && staged.area_square_meters.is_some() {
        master.area_square_meters = staged.area_square_meters;
        filled.push("area_square_meters".to_string());
    }
    filled
}

/// Repoints an extracted FK column and the matching JSON field in `data`.
async fn repoint_column(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    column: &str,
    from: Uuid,
    to: Uuid,
) -> Result<u64, IntakeError> {
    let query = format!(
        "UPDATE {table} SET {column} = ?, data = json_set(data, '$.{column}', ?) WHERE {column} = ?",
        table = table,
        column = column
    );
    let result = sqlx::query(&query)
        .bind(to.to_string())
        .bind(to.to_string())
        .bind(from.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| IntakeError::database(format!("repoint {}.{}: {}", table, column, e)))?;
    Ok(result.rows_affected())
}

/// Repoints an FK that lives only inside the JSON payload.
async fn repoint_json_field(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    field: &str,
    from: Uuid,
    to: Uuid,
) -> Result<u64, IntakeError> {
    let query = format!(
        "UPDATE {table} SET data = json_set(data, '$.{field}', ?) \
         WHERE json_extract(data, '$.{field}') = ?",
        table = table,
        field = field
    );
    let result = sqlx::query(&query)
        .bind(to.to_string())
        .bind(from.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| IntakeError::database(format!("repoint {}.{}: {}", table, field, e)))?;
    Ok(result.rows_affected())
}

async fn update_staging_row_skipped(
    tx: &mut Transaction<'_, Sqlite>,
    row: &StagingRow,
) -> Result<(), IntakeError> {
    let query = format!(
        "UPDATE {} SET validation_status = ?, is_approved_for_commit = 0, committed_entity_id = ? WHERE id = ?",
        row.kind.staging_table()
    );
    sqlx::query(&query)
        .bind(row.validation_status.as_str())
        .bind(row.committed_entity_id.map(|u| u.to_string()))
        .bind(row.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
    Ok(())
}

impl MergeEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Executes a merge decision. Mutates `staging_row` to `Skipped` with
    /// the master id recorded, and returns the repointing audit JSON that
    /// the conflict record keeps.
    pub async fn merge(
        &self,
        entity_type: ConflictEntityType,
        staging_row: &mut StagingRow,
        master_id: Uuid,
    ) -> Result<serde_json::Value, IntakeError> {
        let original_id = staging_row.original_entity_id;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;

        let (filled, repointed) = match entity_type {
            ConflictEntityType::Person => {
                let staged: PersonRecord = staging_row.payload_as()?;
                let mut master: PersonRecord =
                    load_record(&mut tx, "production_persons", master_id).await?;
                let filled = reconcile_person(&mut master, &staged);
                sqlx::query(
                    "UPDATE production_persons SET national_id = ?, governorate_code = ?, \
                     birth_year = ?, gender = ?, family_prefix = ?, data = ? WHERE id = ?",
                )
                .bind(master.national_id.as_deref().map(str::trim))
                .bind(master.governorate_code.as_deref())
                .bind(master.date_of_birth.map(|d| chrono::Datelike::year(&d)))
                .bind(master.gender.map(|g| g.to_string()))
                .bind(family_name_prefix(&master.family_name))
                .bind(serde_json::to_string(&master)?)
                .bind(master_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| IntakeError::database(e.to_string()))?;

                let mut repointed = serde_json::Map::new();
                let tables = [
                    ("production_person_property_relations", "person_id"),
                    ("production_claims", "primary_claimant_id"),
                    ("production_evidences", "person_id"),
                    ("production_certificates", "beneficiary_person_id"),
                ];
                for (table, column) in tables {
                    let n = repoint_column(&mut tx, table, column, original_id, master_id).await?;
                    repointed.insert(table.to_string(), serde_json::json!(n));
                }
                let n = repoint_json_field(
                    &mut tx,
                    "production_households",
                    "head_of_household_person_id",
                    original_id,
                    master_id,
                )
                .await?;
                repointed.insert("production_households".to_string(), serde_json::json!(n));
                (filled, repointed)
            }
            ConflictEntityType::Building => {
                let staged: BuildingRecord = staging_row.payload_as()?;
                let mut master: BuildingRecord =
                    load_record(&mut tx, "production_buildings", master_id).await?;
                let filled = reconcile_building(&mut master, &staged);
                sqlx::query("UPDATE production_buildings SET data = ? WHERE id = ?")
                    .bind(serde_json::to_string(&master)?)
                    .bind(master_id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| IntakeError::database(e.to_string()))?;

                let mut repointed = serde_json::Map::new();
                for (table, column) in [
                    ("production_surveys", "building_id"),
                    ("production_property_units", "building_id"),
                ] {
                    let n = repoint_column(&mut tx, table, column, original_id, master_id).await?;
                    repointed.insert(table.to_string(), serde_json::json!(n));
                }
                (filled, repointed)
            }
            ConflictEntityType::PropertyUnit => {
                let staged: PropertyUnitRecord = staging_row.payload_as()?;
                let mut master: PropertyUnitRecord =
                    load_record(&mut tx, "production_property_units", master_id).await?;
                let filled = reconcile_unit(&mut master, &staged);
                sqlx::query("UPDATE production_property_units SET data = ? WHERE id = ?")
                    .bind(serde_json::to_string(&master)?)
                    .bind(master_id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| IntakeError::database(e.to_string()))?;

                let mut repointed = serde_json::Map::new();
                for (table, column) in [
                    ("production_claims", "property_unit_id"),
                    ("production_person_property_relations", "property_unit_id"),
                ] {
                    let n = repoint_column(&mut tx, table, column, original_id, master_id).await?;
                    repointed.insert(table.to_string(), serde_json::json!(n));
                }
                (filled, repointed)
            }
        };

        staging_row.mark_skipped(master_id)?;
        update_staging_row_skipped(&mut tx, staging_row).await?;

        tx.commit().await.map_err(|e| IntakeError::database(e.to_string()))?;
        info!(
            entity_type = %entity_type,
            original_id = %original_id,
            master_id = %master_id,
            "merge applied"
        );

        Ok(serde_json::json!({
            "master_id": master_id,
            "staging_original_id": original_id,
            "filled_fields": filled,
            "repointed": serde_json::Value::Object(repointed),
        }))
    }

    /// Executes a link-existing decision: no field changes, the staging row
    /// simply resolves to the existing production entity.
    pub async fn link_existing(
        &self,
        staging_row: &mut StagingRow,
        existing_id: Uuid,
    ) -> Result<(), IntakeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        staging_row.mark_skipped(existing_id)?;
        update_staging_row_skipped(&mut tx, staging_row).await?;
        tx.commit().await.map_err(|e| IntakeError::database(e.to_string()))
    }
}

async fn load_record<T: serde::de::DeserializeOwned>(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    id: Uuid,
) -> Result<T, IntakeError> {
    use sqlx::Row;
    let query = format!("SELECT data FROM {} WHERE id = ?", table);
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?
        .ok_or_else(|| IntakeError::NotFound(format!("{} {}", table, id)))?;
    let data: String = row.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
    serde_json::from_str(&data).map_err(|e| IntakeError::SerializationError(format!("{}: {}", table, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenure_intake_domain::entities::records::Gender;

    fn person(national_id: Option<&str>, father: Option<&str>) -> PersonRecord {
        PersonRecord {
            first_name: "أحمد".to_string(),
            father_name: father.map(str::to_string),
            family_name: "الخالد".to_string(),
            national_id: national_id.map(str::to_string),
            date_of_birth: None,
            gender: Some(Gender::Male),
            phone_number: None,
            nationality: None,
            governorate_code: None,
        }
    }

    #[test]
    fn test_reconcile_master_wins() {
        let mut master = person(Some("111"), None);
        let staged = person(Some("222"), Some("محمد"));
        let filled = reconcile_person(&mut master, &staged);
        // Existing master national id is untouched; empty father name filled.
        assert_eq!(master.national_id.as_deref(), Some("111"));
        assert_eq!(master.father_name.as_deref(), Some("محمد"));
        assert_eq!(filled, vec!["father_name".to_string()]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut master = person(Some("111"), Some("محمد"));
        let staged = person(Some("222"), Some("خالد"));
        assert!(reconcile_person(&mut master, &staged).is_empty());
    }
}
