// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenure Intake Domain
//!
//! Pure domain layer of the package intake pipeline for the land-tenure
//! claims registry. This crate holds the business model of one intake run:
//! the `ImportPackage` aggregate and its state machine, staging rows and
//! entity payload records, conflict resolutions, stage reports, value
//! objects (checksums, business identifiers, vocabulary compatibility,
//! diagnostics), domain services (Arabic name matching, the canonical
//! content checksum), and the contracts infrastructure implements
//! (repositories and collaborator ports).
//!
//! ## Layering
//!
//! The domain knows nothing about SQLite, the `.uhc` container encoding,
//! HTTP, or the filesystem. Infrastructure ports (repositories, the blob
//! store, the audit sink) are async traits because they stand in front of
//! I/O; everything CPU-bound - scoring, hashing, state transitions,
//! validation folding - is synchronous.
//!
//! ## Pipeline shape
//!
//! One `ImportPackage` flows through receive → load → validate → detect
//! duplicates → resolve conflicts → commit → archive, with cancellation
//! accepted in any non-terminal state. Stages never run concurrently for
//! one package; the implementation crate enforces that with an advisory
//! lock keyed by package id.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenience
pub use entities::{
    CommitReport, ConflictDecision, ConflictEntityType, ConflictResolution, DuplicateCandidate,
    DuplicateReport, EntityKind, ImportMethod, ImportPackage, ImportPackageSeed, PackageStatus,
    StagingRow, StagingSummary, ValidationReport, ValidationStatus,
};
pub use error::IntakeError;
pub use value_objects::{
    BuildingCode, ClaimNumber, Diagnostic, PackageManifest, PackageNumber, Severity,
    Sha256Checksum, VocabularyCompatibility,
};
