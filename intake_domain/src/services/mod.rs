// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain services and collaborator ports.

pub mod content_hash;
pub mod name_matching;
pub mod ports;

pub use content_hash::{CanonicalHasher, CONTENT_HASH_TABLES};
pub use ports::{
    AuditEntry, AuditSink, BlobRef, BlobStore, ClaimNumberGenerator, Clock, CurrentUser,
    VocabularyRegistry,
};
