// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the error type shared by every layer of the package
//! intake pipeline. The taxonomy distinguishes three families of failures:
//!
//! - **Integrity and compatibility faults** (`ChecksumMismatch`,
//!   `SignatureInvalid`, `VocabularyIncompatible`) — captured on the
//!   `ImportPackage` as a quarantine outcome; they are returned to the caller
//!   but never thrown past the receiver.
//! - **Control-flow faults** (`StateTransitionInvalid`, `PackageBusy`,
//!   `ConflictAlreadyResolved`, `ConflictUnresolved`) — guard the state
//!   machine and the per-package advisory lock.
//! - **Infrastructure faults** (`DatabaseError`, `IoError`, `BlobStoreError`,
//!   `ArchiveError`) — transient or environmental failures that propagate to
//!   the caller after rollback.
//!
//! Validation diagnostics are deliberately *not* errors: the validator
//! returns them as data (see `value_objects::diagnostic`). Only a commit
//! attempted against a package with blocking diagnostics raises
//! `ValidationFailed`.

use thiserror::Error;

/// Domain-specific errors for the package intake pipeline.
///
/// Each variant carries a human-readable message. Variants map onto the HTTP
/// surface in the presentation layer: control-flow faults become 409,
/// validation gates become 422, missing authentication becomes 401, and
/// infrastructure faults become 500.
#[derive(Error, Debug, Clone)]
pub enum IntakeError {
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Vocabulary incompatible: {0}")]
    VocabularyIncompatible(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unresolved conflicts remain: {0}")]
    ConflictUnresolved(String),

    #[error("Conflict already resolved: {0}")]
    ConflictAlreadyResolved(String),

    #[error("Foreign key unresolvable: {0}")]
    FkUnresolvable(String),

    #[error("Duplicate business identifier: {0}")]
    DuplicateBusinessIdentifier(String),

    #[error("Blob store error: {0}")]
    BlobStoreError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Invalid state transition: {0}")]
    StateTransitionInvalid(String),

    #[error("Package busy: {0}")]
    PackageBusy(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntakeError {
    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Creates a new manifest error
    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::ManifestInvalid(msg.into())
    }

    /// Creates a new database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new IO error
    pub fn io(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::ArchiveError(msg.into())
    }

    /// Creates a new blob store error
    pub fn blob_store(msg: impl Into<String>) -> Self {
        Self::BlobStoreError(msg.into())
    }

    /// Creates a new state transition error
    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransitionInvalid(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is a control-flow fault that should surface as a
    /// conflict (HTTP 409) rather than a server failure
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            IntakeError::StateTransitionInvalid(_)
                | IntakeError::PackageBusy(_)
                | IntakeError::ConflictAlreadyResolved(_)
                | IntakeError::ConflictUnresolved(_)
        )
    }

    /// Checks if the error represents an integrity or compatibility fault
    /// that quarantines a package instead of propagating
    pub fn is_quarantine_fault(&self) -> bool {
        matches!(
            self,
            IntakeError::ChecksumMismatch(_)
                | IntakeError::SignatureInvalid(_)
                | IntakeError::VocabularyIncompatible(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            IntakeError::TransportError(_) => "transport",
            IntakeError::ManifestInvalid(_) => "manifest",
            IntakeError::ChecksumMismatch(_) => "integrity",
            IntakeError::SignatureInvalid(_) => "integrity",
            IntakeError::VocabularyIncompatible(_) => "compatibility",
            IntakeError::ValidationFailed(_) => "validation",
            IntakeError::ConflictUnresolved(_) => "conflict",
            IntakeError::ConflictAlreadyResolved(_) => "conflict",
            IntakeError::FkUnresolvable(_) => "commit",
            IntakeError::DuplicateBusinessIdentifier(_) => "commit",
            IntakeError::BlobStoreError(_) => "blob-store",
            IntakeError::ArchiveError(_) => "archive",
            IntakeError::StateTransitionInvalid(_) => "state-machine",
            IntakeError::PackageBusy(_) => "state-machine",
            IntakeError::NotAuthenticated(_) => "security",
            IntakeError::NotFound(_) => "lookup",
            IntakeError::DatabaseError(_) => "database",
            IntakeError::IoError(_) => "io",
            IntakeError::SerializationError(_) => "serialization",
            IntakeError::InvalidConfiguration(_) => "configuration",
            IntakeError::Cancelled(_) => "cancellation",
            IntakeError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for IntakeError {
    fn from(err: std::io::Error) -> Self {
        IntakeError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(err: serde_json::Error) -> Self {
        IntakeError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(IntakeError::transport("eof").category(), "transport");
        assert_eq!(IntakeError::PackageBusy("p".into()).category(), "state-machine");
        assert_eq!(IntakeError::ChecksumMismatch("c".into()).category(), "integrity");
    }

    #[test]
    fn test_conflict_classification() {
        assert!(IntakeError::PackageBusy("p".into()).is_conflict());
        assert!(IntakeError::StateTransitionInvalid("t".into()).is_conflict());
        assert!(!IntakeError::DatabaseError("d".into()).is_conflict());
    }

    #[test]
    fn test_quarantine_classification() {
        assert!(IntakeError::ChecksumMismatch("c".into()).is_quarantine_fault());
        assert!(IntakeError::SignatureInvalid("s".into()).is_quarantine_fault());
        assert!(!IntakeError::ValidationFailed("v".into()).is_quarantine_fault());
    }
}
