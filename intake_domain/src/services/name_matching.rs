// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Arabic Name Matching
//!
//! Similarity scoring used by duplicate detection. Names captured in the
//! field vary in diacritics, Alef/Taa Marbutah/Alef Maksura spellings, and
//! whitespace; normalization folds those variants before any comparison so
//! that orthographic noise never hides a duplicate.
//!
//! Normalization steps, in order:
//!
//! 1. Unicode NFC
//! 2. strip Arabic diacritics (tashkeel, U+064B..U+0652)
//! 3. strip tatweel (U+0640)
//! 4. fold Alef variants (أ إ آ ٱ → ا)
//! 5. fold Taa Marbutah (ة → ه)
//! 6. fold Alef Maksura (ى → ي)
//! 7. collapse whitespace, casefold
//!
//! Scoring is CPU-bound and synchronous; the detector calls it while
//! streaming candidate rows.

use strsim::levenshtein;
use unicode_normalization::UnicodeNormalization;

use crate::entities::records::PersonRecord;
use crate::value_objects::Sha256Checksum;

/// Candidates scoring at or above this create a conflict.
pub const CONFLICT_THRESHOLD: u8 = 70;

/// Candidates scoring at or above this are listed on a conflict.
pub const CANDIDATE_THRESHOLD: u8 = 55;

/// Score for a near-match property unit (same building, identifier within
/// edit distance 2).
pub const PROPERTY_NEAR_MATCH_SCORE: u8 = 70;

/// Normalizes an Arabic (or mixed) name for comparison.
pub fn normalize_arabic(input: &str) -> String {
    let folded: String = input
        .nfc()
        .filter(|c| !matches!(c, '\u{064B}'..='\u{0652}' | '\u{0640}'))
        .map(|c| match c {
            '\u{0623}' | '\u{0625}' | '\u{0622}' | '\u{0671}' => '\u{0627}', // Alef variants
            '\u{0629}' => '\u{0647}',                                        // Taa Marbutah
            '\u{0649}' => '\u{064A}',                                        // Alef Maksura
            other => other,
        })
        .collect();
    folded
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a property-unit identifier: trim, collapse whitespace,
/// casefold.
pub fn normalize_unit_identifier(input: &str) -> String {
    input.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Edit distance between two unit identifiers after normalization. Used by
/// property duplicate detection (near match at distance <= 2).
pub fn unit_identifier_distance(a: &str, b: &str) -> usize {
    levenshtein(&normalize_unit_identifier(a), &normalize_unit_identifier(b))
}

/// Similarity of two already-normalized strings, 0.0-100.0, from
/// Levenshtein distance scaled by the longer length. Two empty strings are
/// identical.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }
    let distance = levenshtein(a, b);
    (1.0 - distance as f64 / longest as f64).max(0.0) * 100.0
}

/// Weighted similarity of a first/father/family name triple, 0.0-100.0.
/// Weights: first 30, father 30, family 40. Absent components compare as
/// empty strings.
pub fn full_name_similarity(
    first: (&str, &str),
    father: (Option<&str>, Option<&str>),
    family: (&str, &str),
) -> f64 {
    let first_sim = string_similarity(&normalize_arabic(first.0), &normalize_arabic(first.1));
    let father_sim = string_similarity(
        &normalize_arabic(father.0.unwrap_or_default()),
        &normalize_arabic(father.1.unwrap_or_default()),
    );
    let family_sim = string_similarity(&normalize_arabic(family.0), &normalize_arabic(family.1));
    first_sim * 0.30 + father_sim * 0.30 + family_sim * 0.40
}

/// Scores a staging person against a production candidate, 0-100.
///
/// - national id exact match: +60
/// - name triple similarity scaled to 40 points
/// - date of birth: same date +15, same year only +8
/// - gender match: +5
pub fn person_similarity(staged: &PersonRecord, candidate: &PersonRecord) -> u8 {
    let mut score = 0.0;

    if let (Some(a), Some(b)) = (staged.national_id.as_deref(), candidate.national_id.as_deref()) {
        if !a.trim().is_empty() && a.trim() == b.trim() {
            score += 60.0;
        }
    }

    let name_fraction = full_name_similarity(
        (&staged.first_name, &candidate.first_name),
        (staged.father_name.as_deref(), candidate.father_name.as_deref()),
        (&staged.family_name, &candidate.family_name),
    ) / 100.0;
    score += name_fraction * 40.0;

    if let (Some(a), Some(b)) = (staged.date_of_birth, candidate.date_of_birth) {
        if a == b {
            score += 15.0;
        } else if a.format("%Y").to_string() == b.format("%Y").to_string() {
            score += 8.0;
        }
    }

    if let (Some(a), Some(b)) = (staged.gender, candidate.gender) {
        if a == b {
            score += 5.0;
        }
    }

    score.min(100.0).round() as u8
}

/// First three letters of the normalized family name, used as a blocking
/// key when no national id is available.
pub fn family_name_prefix(family_name: &str) -> String {
    normalize_arabic(family_name).chars().take(3).collect()
}

/// Stable detection key for a person, hashed for conflict suppression.
/// Suppression survives only while the detection keys are unchanged; any
/// edit to the identifying fields produces a different key.
pub fn person_detection_key(record: &PersonRecord) -> Sha256Checksum {
    let material = format!(
        "{}|{}|{}|{}|{}|{}",
        record.national_id.as_deref().unwrap_or_default().trim(),
        normalize_arabic(&record.first_name),
        normalize_arabic(record.father_name.as_deref().unwrap_or_default()),
        normalize_arabic(&record.family_name),
        record.date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
        record.gender.map(|g| g.to_string()).unwrap_or_default(),
    );
    Sha256Checksum::from_bytes(material.as_bytes())
}

/// Stable detection key for a property unit.
pub fn unit_detection_key(building_code: &str, unit_identifier: &str) -> Sha256Checksum {
    let material = format!("{}|{}", building_code, normalize_unit_identifier(unit_identifier));
    Sha256Checksum::from_bytes(material.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::records::Gender;
    use chrono::NaiveDate;

    fn person(first: &str, father: Option<&str>, family: &str, nid: Option<&str>) -> PersonRecord {
        PersonRecord {
            first_name: first.to_string(),
            father_name: father.map(str::to_string),
            family_name: family.to_string(),
            national_id: nid.map(str::to_string),
            date_of_birth: Some(NaiveDate::from_ymd_opt(1980, 3, 14).unwrap()),
            gender: Some(Gender::Male),
            phone_number: None,
            nationality: None,
            governorate_code: None,
        }
    }

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize_arabic("أَحْمَد"), normalize_arabic("احمد"));
    }

    #[test]
    fn test_normalize_folds_variants() {
        assert_eq!(normalize_arabic("إبراهيم"), normalize_arabic("ابراهيم"));
        assert_eq!(normalize_arabic("فاطمة"), normalize_arabic("فاطمه"));
        assert_eq!(normalize_arabic("مصطفى"), normalize_arabic("مصطفي"));
        assert_eq!(normalize_arabic("محـــمد"), normalize_arabic("محمد"));
        assert_eq!(normalize_arabic("  عبد   الله "), "عبد الله");
    }

    #[test]
    fn test_levenshtein_on_arabic() {
        assert_eq!(levenshtein("محمد", "محمود"), 1);
    }

    #[test]
    fn test_identical_triples_score_full() {
        let sim = full_name_similarity(
            ("أحمد", "احمد"),
            (Some("محمد"), Some("محمد")),
            ("الخالد", "الخالد"),
        );
        assert!((sim - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_person_similarity_caps_at_100() {
        let a = person("أحمد", Some("محمد"), "الخالد", Some("199012345"));
        let b = person("احمد", Some("محمد"), "الخالد", Some("199012345"));
        // 60 (nid) + 40 (names) + 15 (dob) + 5 (gender), capped.
        assert_eq!(person_similarity(&a, &b), 100);
    }

    #[test]
    fn test_person_similarity_without_national_id() {
        let a = person("أحمد", Some("محمد"), "الخالد", None);
        let b = person("احمد", Some("محمد"), "الخالد", None);
        // 40 (names) + 15 (dob) + 5 (gender).
        assert_eq!(person_similarity(&a, &b), 60);
    }

    #[test]
    fn test_family_name_prefix() {
        assert_eq!(family_name_prefix("الخالدي"), "الخ");
        assert_eq!(family_name_prefix("أحمد"), "احم");
        assert_eq!(family_name_prefix("لي"), "لي");
    }

    #[test]
    fn test_detection_key_changes_with_fields() {
        let a = person("أحمد", Some("محمد"), "الخالد", Some("1"));
        let mut b = a.clone();
        assert_eq!(person_detection_key(&a), person_detection_key(&b));
        b.national_id = Some("2".to_string());
        assert_ne!(person_detection_key(&a), person_detection_key(&b));
    }

    #[test]
    fn test_unit_identifier_normalization() {
        assert_eq!(normalize_unit_identifier("  Apt  12 B "), "apt 12 b");
        assert_eq!(
            unit_detection_key("01020300400500006", "APT 1"),
            unit_detection_key("01020300400500006", "apt  1")
        );
    }
}
