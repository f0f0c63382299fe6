// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Payload Records
//!
//! The business fields of each production entity type, as they travel inside
//! a `.uhc` archive and through staging. Every foreign key on these records
//! is the **original UUID** the referenced entity had on the field device;
//! translation to production identifiers happens only at commit, through the
//! in-memory id map. These records are serialized verbatim into the JSON
//! payload column of the staging and production tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::BuildingCode;
use crate::IntakeError;

/// Person gender as captured in the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
        }
    }
}

impl FromStr for Gender {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(IntakeError::ValidationFailed(format!("unknown gender {:?}", other))),
        }
    }
}

/// Claim lifecycle status on the server. Claims arriving from field devices
/// always map to `DraftPendingSubmission` at commit regardless of the value
/// their manifest carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    DraftPendingSubmission,
    Submitted,
    UnderReview,
    Adjudicated,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::DraftPendingSubmission => "draft-pending-submission",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::UnderReview => "under-review",
            ClaimStatus::Adjudicated => "adjudicated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub governorate_code: String,
    pub district_code: String,
    pub sub_district_code: String,
    pub community_code: String,
    pub neighborhood_code: String,
    pub building_number: String,
    /// Coded value from the `building_type` vocabulary.
    pub building_type: Option<String>,
    pub number_of_floors: Option<u32>,
    pub number_of_units: Option<u32>,
    pub address_text: Option<String>,
}

impl BuildingRecord {
    /// Composes the 17-digit business code from the administrative codes.
    pub fn building_code(&self) -> Result<BuildingCode, IntakeError> {
        BuildingCode::compose(
            &self.governorate_code,
            &self.district_code,
            &self.sub_district_code,
            &self.community_code,
            &self.neighborhood_code,
            &self.building_number,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUnitRecord {
    /// Original id of the building this unit belongs to.
    pub building_id: Uuid,
    pub unit_identifier: String,
    /// Coded value from the `unit_type` vocabulary.
    pub unit_type: Option<String>,
    pub floor_number: Option<i32>,
    pub area_square_meters: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub first_name: String,
    pub father_name: Option<String>,
    pub family_name: String,
    pub national_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone_number: Option<String>,
    /// Coded value from the `nationality` vocabulary.
    pub nationality: Option<String>,
    /// Governorate scoping national-id uniqueness checks.
    pub governorate_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdRecord {
    /// Original id of the head-of-household person.
    pub head_of_household_person_id: Option<Uuid>,
    /// Original id of the property unit the household resides in.
    pub residence_property_unit_id: Option<Uuid>,
    pub household_size: Option<u32>,
    pub members_under_18: Option<u32>,
    pub members_18_to_60: Option<u32>,
    pub members_over_60: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonPropertyRelationRecord {
    pub person_id: Uuid,
    pub property_unit_id: Uuid,
    /// Coded value from the `tenure_type` vocabulary.
    pub relation_type: Option<String>,
    /// Percentage in the inclusive range 0-100.
    pub ownership_share_percent: Option<f64>,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub person_id: Option<Uuid>,
    /// Coded value from the `evidence_type` vocabulary.
    pub evidence_type: Option<String>,
    /// Lowercase SHA-256 hex of the attachment blob, when one is carried.
    pub attachment_hash: Option<String>,
    pub attachment_size_bytes: Option<u64>,
    pub file_name: Option<String>,
    pub issued_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub building_id: Uuid,
    pub surveyed_by: Option<String>,
    pub survey_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Original id of the primary claimant person.
    pub primary_claimant_id: Uuid,
    pub property_unit_id: Uuid,
    /// Coded value from the `claim_type` vocabulary.
    pub claim_type: Option<String>,
    /// Status string as exported by the device; normalized at commit.
    pub status: Option<String>,
    pub claimed_share_percent: Option<f64>,
    pub submission_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub claim_id: Option<Uuid>,
    /// Coded value from the `document_type` vocabulary.
    pub document_type: Option<String>,
    pub attachment_hash: Option<String>,
    pub attachment_size_bytes: Option<u64>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub claim_id: Uuid,
    pub referred_to: Option<String>,
    pub reason: Option<String>,
    pub referral_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("f".parse::<Gender>().unwrap(), Gender::Female);
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn test_building_record_code() {
        let record = BuildingRecord {
            governorate_code: "01".to_string(),
            district_code: "02".to_string(),
            sub_district_code: "03".to_string(),
            community_code: "004".to_string(),
            neighborhood_code: "005".to_string(),
            building_number: "00006".to_string(),
            building_type: None,
            number_of_floors: None,
            number_of_units: None,
            address_text: None,
        };
        assert_eq!(record.building_code().unwrap().as_str(), "01020300400500006");
    }
}
