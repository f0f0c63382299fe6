// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archive Signature Verification
//!
//! Field devices may sign the full archive bytes with an Ed25519 key; the
//! manifest carries the signature base64-encoded. Whether a signature is
//! required is a single server-wide policy, never a per-package choice.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::signature::{UnparsedPublicKey, ED25519};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use tenure_intake_domain::IntakeError;

/// Server-wide signature policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePolicy {
    /// Unsigned archives are rejected (quarantined).
    Required,
    /// Unsigned archives are accepted; present signatures are still
    /// verified.
    Optional,
}

pub struct SignatureVerifier {
    policy: SignaturePolicy,
    public_key: Option<Vec<u8>>,
}

impl SignatureVerifier {
    pub fn new(policy: SignaturePolicy, public_key_base64: Option<&str>) -> Result<Self, IntakeError> {
        let public_key = public_key_base64
            .map(|encoded| {
                BASE64.decode(encoded.trim()).map_err(|e| {
                    IntakeError::InvalidConfiguration(format!("signature public key: {}", e))
                })
            })
            .transpose()?;
        if policy == SignaturePolicy::Required && public_key.is_none() {
            return Err(IntakeError::InvalidConfiguration(
                "signature policy is 'required' but no public key is configured".to_string(),
            ));
        }
        Ok(Self { policy, public_key })
    }

    pub fn policy(&self) -> SignaturePolicy {
        self.policy
    }

    /// Verifies an archive on disk against the manifest signature. Returns
    /// the `is_signature_valid` verdict recorded on the package; I/O
    /// failures reading the archive propagate as errors.
    pub async fn verify_archive(
        &self,
        archive_path: &Path,
        signature_base64: Option<&str>,
    ) -> Result<bool, IntakeError> {
        let signature_base64 = signature_base64.map(str::trim).filter(|s| !s.is_empty());

        let Some(encoded) = signature_base64 else {
            // Unsigned run: acceptable only under the optional policy.
            return Ok(self.policy == SignaturePolicy::Optional);
        };

        let Some(key) = self.public_key.as_deref() else {
            warn!("archive carries a signature but no public key is configured; skipping verification");
            return Ok(self.policy == SignaturePolicy::Optional);
        };

        let Ok(signature) = BASE64.decode(encoded) else {
            return Ok(false);
        };

        let archive_bytes = tokio::fs::read(archive_path)
            .await
            .map_err(|e| IntakeError::io(format!("read archive for verification: {}", e)))?;

        let verified = UnparsedPublicKey::new(&ED25519, key)
            .verify(&archive_bytes, &signature)
            .is_ok();
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsigned_archive_follows_policy() {
        let optional = SignatureVerifier::new(SignaturePolicy::Optional, None).unwrap();
        let verdict = optional
            .verify_archive(Path::new("/nonexistent"), None)
            .await
            .unwrap();
        assert!(verdict, "optional policy accepts unsigned archives");
    }

    #[test]
    fn test_required_policy_needs_a_key() {
        assert!(SignatureVerifier::new(SignaturePolicy::Required, None).is_err());
    }

    #[test]
    fn test_bad_key_encoding_rejected() {
        assert!(SignatureVerifier::new(SignaturePolicy::Optional, Some("%%%")).is_err());
    }
}
