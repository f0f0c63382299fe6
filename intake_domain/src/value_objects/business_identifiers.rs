// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Business Identifier Value Objects
//!
//! Human-facing identifiers assigned by the server rather than the field
//! device:
//!
//! - `PackageNumber` — `PKG-YYYY-NNNN`, assigned by the receiver under a
//!   per-year counter.
//! - `ClaimNumber` — `CLM-YYYY-NNNNNNNNN`, assigned at commit under a
//!   per-year counter.
//! - `BuildingCode` — the 17-digit code composed from administrative codes
//!   (governorate-2 / district-2 / sub-district-2 / community-3 /
//!   neighborhood-3 / building-5).
//!
//! Counters themselves live in the persistence layer; these types only own
//! format and composition rules, so a malformed identifier can never be
//! persisted or returned.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::IntakeError;

fn parse_prefixed_number(
    value: &str,
    prefix: &str,
    serial_digits: usize,
) -> Result<(i32, u64), IntakeError> {
    let rest = value.strip_prefix(prefix).ok_or_else(|| {
        IntakeError::InvalidConfiguration(format!("identifier {:?} must start with {}", value, prefix))
    })?;
    let (year_part, serial_part) = rest.split_once('-').ok_or_else(|| {
        IntakeError::InvalidConfiguration(format!("identifier {:?} is missing a serial part", value))
    })?;
    if year_part.len() != 4 || serial_part.len() != serial_digits {
        return Err(IntakeError::InvalidConfiguration(format!(
            "identifier {:?} has wrong field widths",
            value
        )));
    }
    let year: i32 = year_part
        .parse()
        .map_err(|_| IntakeError::InvalidConfiguration(format!("bad year in {:?}", value)))?;
    let serial: u64 = serial_part
        .parse()
        .map_err(|_| IntakeError::InvalidConfiguration(format!("bad serial in {:?}", value)))?;
    Ok((year, serial))
}

/// Human-readable import package number, `PKG-YYYY-NNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageNumber(String);

impl PackageNumber {
    pub fn new(year: i32, serial: u64) -> Self {
        PackageNumber(format!("PKG-{:04}-{:04}", year, serial))
    }

    pub fn parse(value: &str) -> Result<Self, IntakeError> {
        parse_prefixed_number(value, "PKG-", 4)?;
        Ok(PackageNumber(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PackageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageNumber {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Claim business number, `CLM-YYYY-NNNNNNNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimNumber(String);

impl ClaimNumber {
    pub fn new(year: i32, serial: u64) -> Self {
        ClaimNumber(format!("CLM-{:04}-{:09}", year, serial))
    }

    pub fn parse(value: &str) -> Result<Self, IntakeError> {
        parse_prefixed_number(value, "CLM-", 9)?;
        Ok(ClaimNumber(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClaimNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClaimNumber {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The 17-digit building code composed from administrative hierarchy codes.
///
/// Field widths: governorate 2, district 2, sub-district 2, community 3,
/// neighborhood 3, building 5. Each component must already be zero-padded
/// digits of the expected width; composition never re-pads, because the
/// administrative codes are controlled vocabulary values, not free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingCode(String);

impl BuildingCode {
    const COMPONENT_WIDTHS: [(&'static str, usize); 6] = [
        ("governorate", 2),
        ("district", 2),
        ("sub-district", 2),
        ("community", 3),
        ("neighborhood", 3),
        ("building", 5),
    ];

    /// Composes the 17-digit code from its administrative components.
    pub fn compose(
        governorate: &str,
        district: &str,
        sub_district: &str,
        community: &str,
        neighborhood: &str,
        building: &str,
    ) -> Result<Self, IntakeError> {
        let components = [governorate, district, sub_district, community, neighborhood, building];
        for ((name, width), value) in Self::COMPONENT_WIDTHS.iter().zip(components.iter()) {
            if value.len() != *width || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(IntakeError::ValidationFailed(format!(
                    "{} code {:?} must be exactly {} digits",
                    name, value, width
                )));
            }
        }
        Ok(BuildingCode(components.concat()))
    }

    pub fn parse(value: &str) -> Result<Self, IntakeError> {
        if value.len() != 17 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IntakeError::ValidationFailed(format!(
                "building code {:?} must be exactly 17 digits",
                value
            )));
        }
        Ok(BuildingCode(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BuildingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_number_format() {
        let number = PackageNumber::new(2025, 7);
        assert_eq!(number.as_str(), "PKG-2025-0007");
        assert_eq!(PackageNumber::parse("PKG-2025-0007").unwrap(), number);
    }

    #[test]
    fn test_claim_number_format() {
        let number = ClaimNumber::new(2025, 42);
        assert_eq!(number.as_str(), "CLM-2025-000000042");
        assert!(ClaimNumber::parse("CLM-2025-42").is_err());
        assert!(ClaimNumber::parse("PKG-2025-000000042").is_err());
    }

    #[test]
    fn test_building_code_composition() {
        let code = BuildingCode::compose("01", "02", "03", "004", "005", "00006").unwrap();
        assert_eq!(code.as_str(), "01020300400500006");
        assert_eq!(code.as_str().len(), 17);
    }

    #[test]
    fn test_building_code_rejects_wrong_widths() {
        assert!(BuildingCode::compose("1", "02", "03", "004", "005", "00006").is_err());
        assert!(BuildingCode::compose("01", "02", "03", "004", "005", "6").is_err());
        assert!(BuildingCode::compose("0a", "02", "03", "004", "005", "00006").is_err());
        assert!(BuildingCode::parse("123").is_err());
    }
}
