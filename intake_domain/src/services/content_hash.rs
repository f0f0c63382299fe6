// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Canonical Content Checksum
//!
//! The exporter seals a package with a SHA-256 over its data tables; the
//! receiver recomputes the same digest to prove the archive was not altered
//! after export. The manifest table is excluded - the manifest row carries
//! the hash and would otherwise be self-referential.
//!
//! Canonical form, shared verbatim between exporter and server:
//!
//! - tables in the fixed order of [`CONTENT_HASH_TABLES`]
//! - per table: u32-LE length-prefixed UTF-8 NFC table name, then the row
//!   count as u64 LE
//! - rows sorted by primary key (string order)
//! - text rows: u32-LE length-prefixed NFC id, u32-LE length-prefixed NFC
//!   payload
//! - blob rows: u32-LE length-prefixed NFC id, u64-LE content length, raw
//!   content bytes
//!
//! Any single-byte change to any data table produces a different digest.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::value_objects::Sha256Checksum;

/// Data tables covered by the content checksum, in hashing order. The
/// manifest is deliberately absent.
pub const CONTENT_HASH_TABLES: [&str; 11] = [
    "buildings",
    "property_units",
    "persons",
    "households",
    "person_property_relations",
    "evidences",
    "surveys",
    "claims",
    "documents",
    "referrals",
    "attachment_blobs",
];

/// Incremental canonical hasher. Callers must feed tables in
/// [`CONTENT_HASH_TABLES`] order and rows sorted by primary key.
pub struct CanonicalHasher {
    hasher: Sha256,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        CanonicalHasher { hasher: Sha256::new() }
    }

    fn push_text(&mut self, text: &str) {
        let normalized: String = text.nfc().collect();
        let bytes = normalized.as_bytes();
        self.hasher.update((bytes.len() as u32).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Starts a table section.
    pub fn begin_table(&mut self, name: &str, row_count: u64) {
        self.push_text(name);
        self.hasher.update(row_count.to_le_bytes());
    }

    /// Adds one row whose payload is text (JSON).
    pub fn text_row(&mut self, id: &str, payload: &str) {
        self.push_text(id);
        self.push_text(payload);
    }

    /// Adds one attachment blob row.
    pub fn blob_row(&mut self, id: &str, content: &[u8]) {
        self.push_text(id);
        self.hasher.update((content.len() as u64).to_le_bytes());
        self.hasher.update(content);
    }

    pub fn finish(self) -> Sha256Checksum {
        Sha256Checksum::from_digest(self.hasher)
    }
}

impl Default for CanonicalHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_one_row(payload: &str) -> Sha256Checksum {
        let mut hasher = CanonicalHasher::new();
        hasher.begin_table("persons", 1);
        hasher.text_row("00000000-0000-0000-0000-000000000001", payload);
        hasher.finish()
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(hash_one_row("{\"a\":1}"), hash_one_row("{\"a\":1}"));
    }

    #[test]
    fn test_single_byte_change_flips_digest() {
        assert_ne!(hash_one_row("{\"a\":1}"), hash_one_row("{\"a\":2}"));
    }

    #[test]
    fn test_nfc_equivalent_inputs_hash_identically() {
        // U+00E9 (precomposed) vs U+0065 U+0301 (decomposed)
        assert_eq!(hash_one_row("caf\u{00E9}"), hash_one_row("cafe\u{0301}"));
    }

    #[test]
    fn test_length_prefix_prevents_boundary_shifts() {
        let mut a = CanonicalHasher::new();
        a.begin_table("persons", 1);
        a.text_row("ab", "c");
        let mut b = CanonicalHasher::new();
        b.begin_table("persons", 1);
        b.text_row("a", "bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_blob_rows_hash_raw_bytes() {
        let mut a = CanonicalHasher::new();
        a.begin_table("attachment_blobs", 1);
        a.blob_row("h1", &[0xDE, 0xAD]);
        let mut b = CanonicalHasher::new();
        b.begin_table("attachment_blobs", 1);
        b.blob_row("h1", &[0xDE, 0xAE]);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_manifest_is_not_a_content_table() {
        assert!(!CONTENT_HASH_TABLES.contains(&"manifest"));
        assert_eq!(CONTENT_HASH_TABLES.len(), 11);
    }
}
