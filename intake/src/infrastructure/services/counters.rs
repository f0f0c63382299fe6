// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Business Identifier Counters
//!
//! Per-year monotone counters backing `PKG-YYYY-NNNN` and
//! `CLM-YYYY-NNNNNNNNN`. Allocation is one atomic upsert; the database
//! serializes concurrent callers on the counter row, so duplicates are
//! impossible. Numbers allocated by a transaction that later rolls back are
//! burned - gaps are acceptable, duplicates are not.

use async_trait::async_trait;
use sqlx::SqlitePool;

use tenure_intake_domain::services::ports::ClaimNumberGenerator;
use tenure_intake_domain::value_objects::{ClaimNumber, PackageNumber};
use tenure_intake_domain::IntakeError;

const PACKAGE_COUNTER: &str = "package-number";
const CLAIM_COUNTER: &str = "claim-number";

pub struct SqliteCounterService {
    pool: SqlitePool,
}

impl SqliteCounterService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn allocate(&self, kind: &str, year: i32) -> Result<u64, IntakeError> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO counters (kind, year, value) VALUES (?, ?, 1) \
             ON CONFLICT(kind, year) DO UPDATE SET value = value + 1 \
             RETURNING value",
        )
        .bind(kind)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IntakeError::database(format!("counter {}/{}: {}", kind, year, e)))?;
        Ok(value.max(0) as u64)
    }

    pub async fn next_package_number(&self, year: i32) -> Result<PackageNumber, IntakeError> {
        let serial = self.allocate(PACKAGE_COUNTER, year).await?;
        Ok(PackageNumber::new(year, serial))
    }
}

#[async_trait]
impl ClaimNumberGenerator for SqliteCounterService {
    async fn next_for(&self, year: i32) -> Result<ClaimNumber, IntakeError> {
        let serial = self.allocate(CLAIM_COUNTER, year).await?;
        Ok(ClaimNumber::new(year, serial))
    }
}
