// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Package Manifest
//!
//! The single metadata record inside a `.uhc` container. The manifest is the
//! only part of the archive the receiver trusts before integrity checks: it
//! carries the package identity used for idempotency, the declared content
//! checksum, the optional digital signature, and the vocabulary-version
//! snapshot the validator later enforces.
//!
//! Field names are version-stable; the archive reader maps them 1:1 from the
//! manifest table columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::IntakeError;

/// Archive schema versions this server knows how to stage.
pub const SUPPORTED_SCHEMA_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// Manifest record of one exported package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub package_id: Uuid,
    pub schema_version: String,
    pub created_utc: DateTime<Utc>,
    pub exported_date_utc: DateTime<Utc>,
    pub exported_by_user_id: Uuid,
    pub device_id: String,
    pub total_record_count: u64,
    /// Row counts per entity table name (`buildings`, `persons`, ...).
    pub entity_counts: BTreeMap<String, u64>,
    pub total_attachment_size_bytes: u64,
    /// Vocabulary domain → semver string, as exported.
    pub vocabulary_versions: BTreeMap<String, String>,
    /// Lowercase SHA-256 hex over the data tables, or empty when the
    /// exporter did not seal the package.
    pub checksum: String,
    /// Optional base64 Ed25519 signature over the full archive bytes.
    pub digital_signature: Option<String>,
}

impl PackageManifest {
    /// Structural validation of the manifest record itself. Integrity checks
    /// (checksum recomputation, signature verification) happen separately.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.package_id.is_nil() {
            return Err(IntakeError::ManifestInvalid("package id is nil".to_string()));
        }
        if self.device_id.trim().is_empty() {
            return Err(IntakeError::ManifestInvalid("device id is empty".to_string()));
        }
        if self.schema_version.trim().is_empty() {
            return Err(IntakeError::ManifestInvalid("schema version is empty".to_string()));
        }
        Ok(())
    }

    pub fn is_schema_supported(&self) -> bool {
        SUPPORTED_SCHEMA_VERSIONS.contains(&self.schema_version.as_str())
    }

    /// The declared checksum, treating the empty string as absent.
    pub fn declared_checksum(&self) -> Option<&str> {
        let trimmed = self.checksum.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn has_signature(&self) -> bool {
        self.digital_signature
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> PackageManifest {
        PackageManifest {
            package_id: Uuid::new_v4(),
            schema_version: "1.0".to_string(),
            created_utc: Utc::now(),
            exported_date_utc: Utc::now(),
            exported_by_user_id: Uuid::new_v4(),
            device_id: "tablet-017".to_string(),
            total_record_count: 0,
            entity_counts: BTreeMap::new(),
            total_attachment_size_bytes: 0,
            vocabulary_versions: BTreeMap::new(),
            checksum: String::new(),
            digital_signature: None,
        }
    }

    #[test]
    fn test_validate_rejects_nil_package_id() {
        let mut m = manifest();
        m.package_id = Uuid::nil();
        assert!(m.validate().is_err());
        assert!(manifest().validate().is_ok());
    }

    #[test]
    fn test_empty_checksum_is_absent() {
        let mut m = manifest();
        assert_eq!(m.declared_checksum(), None);
        m.checksum = "  ".to_string();
        assert_eq!(m.declared_checksum(), None);
        m.checksum = "abc".to_string();
        assert_eq!(m.declared_checksum(), Some("abc"));
    }

    #[test]
    fn test_schema_support() {
        let mut m = manifest();
        assert!(m.is_schema_supported());
        m.schema_version = "9.9".to_string();
        assert!(!m.is_schema_supported());
    }
}
