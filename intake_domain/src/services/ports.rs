// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Collaborator Ports
//!
//! Interfaces the intake pipeline consumes but does not own: the clock, the
//! invoking user, the audit sink, the claim-number generator, the
//! vocabulary registry, and the blob store. The domain defines *what* these
//! collaborators do; infrastructure decides *how*. CPU-free lookups are
//! synchronous; anything that may touch I/O is async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::value_objects::{ClaimNumber, Sha256Checksum};
use crate::IntakeError;

/// UTC time source.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Identity of the invoking user. Every mutating entry point requires one.
pub trait CurrentUser: Send + Sync {
    fn user_id(&self) -> Option<Uuid>;

    fn require_user_id(&self) -> Result<Uuid, IntakeError> {
        self.user_id().ok_or_else(|| {
            IntakeError::NotAuthenticated("a user identity is required for this operation".to_string())
        })
    }
}

/// One audit record. Old/new values are JSON snapshots.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<Uuid>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub changed_fields: Vec<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        AuditEntry {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            user_id: None,
            old_value: None,
            new_value: None,
            changed_fields: Vec::new(),
        }
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_new_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_changed_fields(mut self, fields: Vec<String>) -> Self {
        self.changed_fields = fields;
        self
    }
}

/// Sink for audit records. Failures must not fail the audited operation;
/// implementations log and swallow.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: AuditEntry);
}

/// Allocates claim business numbers under a per-year monotone counter.
/// Implementations must serialize allocation so that concurrent commits
/// never observe the same number; gaps are acceptable, duplicates are not.
#[async_trait]
pub trait ClaimNumberGenerator: Send + Sync {
    async fn next_for(&self, year: i32) -> Result<ClaimNumber, IntakeError>;
}

/// The server's controlled vocabularies: current versions and code sets.
pub trait VocabularyRegistry: Send + Sync {
    fn current_versions(&self) -> BTreeMap<String, Version>;

    fn knows_domain(&self, domain: &str) -> bool;

    /// Whether `code` is a member of the server's current code set for
    /// `domain`.
    fn contains_code(&self, domain: &str, code: &str) -> bool;
}

/// Reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub hash: Sha256Checksum,
    /// Path relative to the blob root.
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Content-addressed attachment storage plus container archival.
/// `put` must be safe under concurrent identical writes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the existing reference when a blob with this hash is already
    /// stored.
    async fn probe_by_hash(&self, hash: &Sha256Checksum) -> Result<Option<BlobRef>, IntakeError>;

    async fn put(&self, hash: &Sha256Checksum, content: &[u8]) -> Result<BlobRef, IntakeError>;

    /// Moves a committed container to `archives/YYYY/MM/<package_id>.uhc`
    /// and returns the relative archive path.
    async fn archive_package(
        &self,
        current_path: &Path,
        package_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<String, IntakeError>;
}
