// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Sink
//!
//! Appends every mutating intake operation to the `audit_log` table and
//! mirrors it as a tracing event. Audit failures never fail the audited
//! operation: the write error is logged and swallowed.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use tenure_intake_domain::services::ports::{AuditEntry, AuditSink};

pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn log(&self, entry: AuditEntry) {
        info!(
            action = entry.action.as_str(),
            entity_type = entry.entity_type.as_str(),
            entity_id = entry.entity_id.as_str(),
            user_id = entry.user_id.map(|u| u.to_string()).as_deref().unwrap_or("-"),
            "audit"
        );
        let result = sqlx::query(
            "INSERT INTO audit_log \
             (occurred_at, user_id, action, entity_type, entity_id, old_value, new_value, changed_fields) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.old_value.map(|v| v.to_string()))
        .bind(entry.new_value.map(|v| v.to_string()))
        .bind(serde_json::to_string(&entry.changed_fields).unwrap_or_default())
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to persist audit entry");
        }
    }
}
