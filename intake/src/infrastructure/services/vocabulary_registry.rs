// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Static Vocabulary Registry
//!
//! The server's controlled vocabularies, loaded from configuration at
//! start-up. Vocabulary CRUD is owned by another subsystem; the intake
//! pipeline only needs the current version per domain and code-set
//! membership checks.

use semver::Version;
use std::collections::{BTreeMap, BTreeSet};

use tenure_intake_domain::services::ports::VocabularyRegistry;
use tenure_intake_domain::IntakeError;

pub struct StaticVocabularyRegistry {
    versions: BTreeMap<String, Version>,
    codes: BTreeMap<String, BTreeSet<String>>,
}

impl StaticVocabularyRegistry {
    /// Builds the registry from `(domain, version string, codes)` triples.
    pub fn from_domains<I, C>(domains: I) -> Result<Self, IntakeError>
    where
        I: IntoIterator<Item = (String, String, C)>,
        C: IntoIterator<Item = String>,
    {
        let mut versions = BTreeMap::new();
        let mut codes = BTreeMap::new();
        for (domain, version, domain_codes) in domains {
            let parsed = Version::parse(&version).map_err(|e| {
                IntakeError::InvalidConfiguration(format!(
                    "vocabulary {} version {:?}: {}",
                    domain, version, e
                ))
            })?;
            versions.insert(domain.clone(), parsed);
            codes.insert(domain, domain_codes.into_iter().collect());
        }
        Ok(Self { versions, codes })
    }
}

impl VocabularyRegistry for StaticVocabularyRegistry {
    fn current_versions(&self) -> BTreeMap<String, Version> {
        self.versions.clone()
    }

    fn knows_domain(&self, domain: &str) -> bool {
        self.versions.contains_key(domain)
    }

    fn contains_code(&self, domain: &str, code: &str) -> bool {
        self.codes.get(domain).is_some_and(|set| set.contains(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = StaticVocabularyRegistry::from_domains(vec![(
            "claim_type".to_string(),
            "1.4.2".to_string(),
            vec!["ownership".to_string(), "tenancy".to_string()],
        )])
        .unwrap();
        assert!(registry.knows_domain("claim_type"));
        assert!(!registry.knows_domain("building_type"));
        assert!(registry.contains_code("claim_type", "ownership"));
        assert!(!registry.contains_code("claim_type", "squatting"));
        assert_eq!(registry.current_versions()["claim_type"], Version::parse("1.4.2").unwrap());
    }

    #[test]
    fn test_bad_version_rejected() {
        let result = StaticVocabularyRegistry::from_domains(vec![(
            "claim_type".to_string(),
            "one-dot-four".to_string(),
            Vec::<String>::new(),
        )]);
        assert!(result.is_err());
    }
}
