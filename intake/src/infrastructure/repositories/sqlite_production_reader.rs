// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Production Reader
//!
//! Read-side of the production registry used by duplicate detection and the
//! cross-package uniqueness checks. Person blocking keys (national id;
//! birth-year + gender + normalized family-name prefix) are materialized as
//! indexed columns at commit, so candidate pulls are single index scans
//! rather than full-table similarity passes.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use tenure_intake_domain::entities::records::{PersonRecord, PropertyUnitRecord};
use tenure_intake_domain::repositories::{ProductionPerson, ProductionReader, ProductionUnit};
use tenure_intake_domain::IntakeError;

pub struct SqliteProductionReader {
    pool: SqlitePool,
}

impl SqliteProductionReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn person_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProductionPerson, IntakeError> {
    let id: String = row.try_get("id").map_err(|e| IntakeError::database(e.to_string()))?;
    let data: String = row.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
    let record: PersonRecord = serde_json::from_str(&data)?;
    Ok(ProductionPerson {
        id: Uuid::from_str(&id).map_err(|e| IntakeError::database(e.to_string()))?,
        record,
    })
}

#[async_trait]
impl ProductionReader for SqliteProductionReader {
    async fn persons_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Vec<ProductionPerson>, IntakeError> {
        let rows = sqlx::query("SELECT id, data FROM production_persons WHERE national_id = ?")
            .bind(national_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        rows.iter().map(person_from_row).collect()
    }

    async fn persons_by_blocking_key(
        &self,
        birth_year: i32,
        gender: &str,
        family_prefix: &str,
    ) -> Result<Vec<ProductionPerson>, IntakeError> {
        let rows = sqlx::query(
            "SELECT id, data FROM production_persons \
             WHERE birth_year = ? AND gender = ? AND family_prefix = ?",
        )
        .bind(birth_year)
        .bind(gender)
        .bind(family_prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;
        rows.iter().map(person_from_row).collect()
    }

    async fn building_by_code(&self, building_code: &str) -> Result<Option<Uuid>, IntakeError> {
        let row = sqlx::query("SELECT id FROM production_buildings WHERE building_code = ?")
            .bind(building_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?;
        row.map(|r| {
            let id: String = r.try_get("id").map_err(|e| IntakeError::database(e.to_string()))?;
            Uuid::from_str(&id).map_err(|e| IntakeError::database(e.to_string()))
        })
        .transpose()
    }

    async fn units_for_building_code(
        &self,
        building_code: &str,
    ) -> Result<Vec<ProductionUnit>, IntakeError> {
        let rows = sqlx::query(
            "SELECT u.id, u.building_id, u.data FROM production_property_units u \
             JOIN production_buildings b ON b.id = u.building_id \
             WHERE b.building_code = ?",
        )
        .bind(building_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IntakeError::database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(|e| IntakeError::database(e.to_string()))?;
                let data: String =
                    row.try_get("data").map_err(|e| IntakeError::database(e.to_string()))?;
                let record: PropertyUnitRecord = serde_json::from_str(&data)?;
                Ok(ProductionUnit {
                    id: Uuid::from_str(&id).map_err(|e| IntakeError::database(e.to_string()))?,
                    record,
                })
            })
            .collect()
    }

    async fn national_id_exists(
        &self,
        national_id: &str,
        governorate_code: Option<&str>,
    ) -> Result<bool, IntakeError> {
        let count: i64 = match governorate_code {
            Some(gov) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM production_persons WHERE national_id = ? AND governorate_code = ?",
            )
            .bind(national_id)
            .bind(gov)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IntakeError::database(e.to_string()))?,
            None => sqlx::query_scalar("SELECT COUNT(*) FROM production_persons WHERE national_id = ?")
                .bind(national_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| IntakeError::database(e.to_string()))?,
        };
        Ok(count > 0)
    }
}
