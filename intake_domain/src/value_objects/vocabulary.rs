// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vocabulary Version Compatibility
//!
//! Field devices snapshot the controlled-vocabulary versions they were
//! exported against; the server compares that snapshot against its own
//! current versions before accepting a package. Comparison follows semver
//! semantics per domain:
//!
//! - equal → `Identical`
//! - patch-only difference → `PatchDifference` (compatible, no warning)
//! - minor difference, same major → `MinorDifference` (compatible with a
//!   warning: the archive may carry codes the server does not know yet)
//! - major difference → `MajorDifference` (incompatible)
//! - domain unknown to the server → `UnknownDomain` (incompatible)
//!
//! The overall verdict is compatible iff no domain is `MajorDifference` or
//! `UnknownDomain`; fully compatible requires every domain `Identical`.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Per-domain comparison outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatibilityLevel {
    Identical,
    PatchDifference,
    MinorDifference,
    MajorDifference,
    UnknownDomain,
}

impl CompatibilityLevel {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, CompatibilityLevel::MajorDifference | CompatibilityLevel::UnknownDomain)
    }
}

impl Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompatibilityLevel::Identical => "identical",
            CompatibilityLevel::PatchDifference => "patch-difference",
            CompatibilityLevel::MinorDifference => "minor-difference",
            CompatibilityLevel::MajorDifference => "major-difference",
            CompatibilityLevel::UnknownDomain => "unknown-domain",
        };
        f.write_str(text)
    }
}

/// One vocabulary domain compared between package and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainComparison {
    pub domain: String,
    pub package_version: String,
    pub server_version: Option<String>,
    pub level: CompatibilityLevel,
}

/// Compatibility verdict over all domains present in a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VocabularyCompatibility {
    pub comparisons: Vec<DomainComparison>,
}

impl VocabularyCompatibility {
    /// Compares the manifest's versions map against the server's current
    /// versions. A package version that does not parse as semver is treated
    /// as a major difference: the exporter is speaking a format the server
    /// cannot reason about.
    pub fn compare(
        server_versions: &BTreeMap<String, Version>,
        package_versions: &BTreeMap<String, String>,
    ) -> Self {
        let comparisons = package_versions
            .iter()
            .map(|(domain, raw)| {
                let server = server_versions.get(domain);
                let level = match (server, Version::parse(raw)) {
                    (None, _) => CompatibilityLevel::UnknownDomain,
                    (Some(_), Err(_)) => CompatibilityLevel::MajorDifference,
                    (Some(current), Ok(pkg)) => {
                        if *current == pkg {
                            CompatibilityLevel::Identical
                        } else if current.major != pkg.major {
                            CompatibilityLevel::MajorDifference
                        } else if current.minor != pkg.minor {
                            CompatibilityLevel::MinorDifference
                        } else {
                            CompatibilityLevel::PatchDifference
                        }
                    }
                };
                DomainComparison {
                    domain: domain.clone(),
                    package_version: raw.clone(),
                    server_version: server.map(|v| v.to_string()),
                    level,
                }
            })
            .collect();
        VocabularyCompatibility { comparisons }
    }

    pub fn is_compatible(&self) -> bool {
        self.comparisons.iter().all(|c| c.level.is_compatible())
    }

    pub fn is_fully_compatible(&self) -> bool {
        self.comparisons.iter().all(|c| c.level == CompatibilityLevel::Identical)
    }

    /// Domains flagged `MinorDifference`; the validator relaxes unknown-code
    /// checks to warnings for these.
    pub fn minor_difference_domains(&self) -> Vec<&str> {
        self.comparisons
            .iter()
            .filter(|c| c.level == CompatibilityLevel::MinorDifference)
            .map(|c| c.domain.as_str())
            .collect()
    }

    /// Human-readable issues for every non-identical domain.
    pub fn issues(&self) -> Vec<String> {
        self.comparisons
            .iter()
            .filter(|c| c.level != CompatibilityLevel::Identical)
            .map(|c| {
                format!(
                    "vocabulary {}: package {} vs server {} ({})",
                    c.domain,
                    c.package_version,
                    c.server_version.as_deref().unwrap_or("<none>"),
                    c.level
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> BTreeMap<String, Version> {
        let mut map = BTreeMap::new();
        map.insert("claim_type".to_string(), Version::parse("1.4.2").unwrap());
        map
    }

    fn compare_single(package_version: &str, domain: &str) -> CompatibilityLevel {
        let mut pkg = BTreeMap::new();
        pkg.insert(domain.to_string(), package_version.to_string());
        VocabularyCompatibility::compare(&server(), &pkg).comparisons[0].level
    }

    #[test]
    fn test_semver_rules_matrix() {
        assert_eq!(compare_single("1.4.2", "claim_type"), CompatibilityLevel::Identical);
        assert_eq!(compare_single("1.4.7", "claim_type"), CompatibilityLevel::PatchDifference);
        assert_eq!(compare_single("1.5.0", "claim_type"), CompatibilityLevel::MinorDifference);
        assert_eq!(compare_single("2.0.0", "claim_type"), CompatibilityLevel::MajorDifference);
        assert_eq!(compare_single("1.4.2", "no_such_domain"), CompatibilityLevel::UnknownDomain);
    }

    #[test]
    fn test_overall_verdicts() {
        let mut pkg = BTreeMap::new();
        pkg.insert("claim_type".to_string(), "1.5.0".to_string());
        let compat = VocabularyCompatibility::compare(&server(), &pkg);
        assert!(compat.is_compatible());
        assert!(!compat.is_fully_compatible());
        assert_eq!(compat.minor_difference_domains(), vec!["claim_type"]);

        pkg.insert("other".to_string(), "1.0.0".to_string());
        let compat = VocabularyCompatibility::compare(&server(), &pkg);
        assert!(!compat.is_compatible());
        assert_eq!(compat.issues().len(), 2);
    }

    #[test]
    fn test_unparseable_package_version_is_incompatible() {
        assert_eq!(compare_single("not-a-version", "claim_type"), CompatibilityLevel::MajorDifference);
    }
}
