// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SHA-256 Checksum Value Object
//!
//! Lowercase hex representation of a SHA-256 digest. Used for the archive
//! content checksum, attachment deduplication keys, and conflict suppression
//! detection keys. The invariant — exactly 64 lowercase hex characters — is
//! enforced on construction, so any `Sha256Checksum` held by the pipeline is
//! comparable byte-for-byte with exporter output.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::IntakeError;

/// A validated lowercase SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha256Checksum(String);

impl Sha256Checksum {
    /// Computes the digest of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::from_digest(hasher)
    }

    /// Finalizes an incremental hasher into a checksum.
    pub fn from_digest(hasher: Sha256) -> Self {
        Sha256Checksum(hex::encode(hasher.finalize()))
    }

    /// Parses a hex string, folding case. Empty input is rejected; callers
    /// that treat an empty manifest checksum as "absent" must do so before
    /// parsing.
    pub fn parse(value: &str) -> Result<Self, IntakeError> {
        let folded = value.trim().to_ascii_lowercase();
        if folded.len() != 64 || !folded.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IntakeError::ManifestInvalid(format!(
                "not a SHA-256 hex digest: {:?}",
                value
            )));
        }
        Ok(Sha256Checksum(folded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Sha256Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sha256Checksum {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_is_lowercase_hex() {
        let sum = Sha256Checksum::from_bytes(b"test data");
        assert_eq!(sum.as_str().len(), 64);
        assert!(sum.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Deterministic
        assert_eq!(sum, Sha256Checksum::from_bytes(b"test data"));
    }

    #[test]
    fn test_parse_folds_case() {
        let sum = Sha256Checksum::from_bytes(b"x");
        let upper = sum.as_str().to_ascii_uppercase();
        assert_eq!(Sha256Checksum::parse(&upper).unwrap(), sum);
    }

    #[test]
    fn test_parse_rejects_short_and_empty() {
        assert!(Sha256Checksum::parse("").is_err());
        assert!(Sha256Checksum::parse("abc123").is_err());
        assert!(Sha256Checksum::parse(&"g".repeat(64)).is_err());
    }
}
