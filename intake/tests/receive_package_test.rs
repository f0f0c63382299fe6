// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Receiver integration tests: idempotency, checksum verification, and
//! quarantine behavior against real `.uhc` fixtures.

mod common;

use common::{building, json, person, TestHarness, UhcBuilder};
use std::path::Path;
use uuid::Uuid;

use tenure_intake::domain::entities::PackageStatus;

#[tokio::test]
async fn test_receive_clean_package_is_pending() {
    let harness = TestHarness::new().await;
    let package_id = Uuid::new_v4();
    let mut builder = UhcBuilder::new(package_id);
    builder.push("buildings", Uuid::new_v4(), json(building()));
    builder.push("persons", Uuid::new_v4(), json(person("أحمد", "الخالد", Some("1001"))));
    let archive = harness.scratch_path("clean.uhc");
    builder.write(&archive).await.close().await;

    let result = harness.upload(&archive, "clean.uhc").await;
    assert!(result.success);
    assert!(!result.is_duplicate_package);
    assert!(!result.quarantined);
    assert_eq!(result.package.status, PackageStatus::Pending);
    assert!(result.package.is_checksum_valid);
    assert!(result.package.is_signature_valid);
    assert!(result.package.package_number.starts_with("PKG-"));
    assert_eq!(result.package.package_id, package_id);
}

#[tokio::test]
async fn test_receive_is_idempotent_by_package_id() {
    let harness = TestHarness::new().await;
    let package_id = Uuid::new_v4();
    let mut builder = UhcBuilder::new(package_id);
    builder.push("persons", Uuid::new_v4(), json(person("أحمد", "الخالد", None)));

    let first_path = harness.scratch_path("first.uhc");
    builder.write(&first_path).await.close().await;
    let first = harness.upload(&first_path, "first.uhc").await;

    let second_path = harness.scratch_path("second.uhc");
    builder.write(&second_path).await.close().await;
    let second = harness.upload(&second_path, "second.uhc").await;

    assert!(!first.is_duplicate_package);
    assert!(second.is_duplicate_package);
    // Both results reference the same aggregate.
    assert_eq!(first.package.id, second.package.id);
    assert_eq!(first.package.package_number, second.package.package_number);
    // The duplicate's spool file is cleaned up.
    assert!(!second_path.exists());
}

#[tokio::test]
async fn test_tampered_table_quarantines_with_single_error() {
    let harness = TestHarness::new().await;
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    builder.push("buildings", Uuid::new_v4(), json(building()));
    let archive = harness.scratch_path("tampered.uhc");
    let pool = builder.write(&archive).await;

    // Alter a data table after export; the sealed checksum no longer holds.
    sqlx::query("UPDATE buildings SET data = json_set(data, '$.number_of_floors', 9)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let result = harness.upload(&archive, "tampered.uhc").await;
    assert!(!result.success);
    assert!(result.quarantined);
    assert_eq!(result.package.status, PackageStatus::Quarantined);
    assert!(!result.package.is_checksum_valid);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("checksum"));
    // The container is retained for forensic inspection.
    assert!(Path::new(&archive).exists());
}

#[tokio::test]
async fn test_major_vocabulary_difference_quarantines() {
    let harness = TestHarness::new().await;
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    builder
        .vocabulary_versions
        .insert("claim_type".to_string(), "2.0.0".to_string());
    builder.push("persons", Uuid::new_v4(), json(person("أحمد", "الخالد", None)));
    let archive = harness.scratch_path("majorvocab.uhc");
    builder.write(&archive).await.close().await;

    let result = harness.upload(&archive, "majorvocab.uhc").await;
    assert!(result.quarantined);
    assert!(!result.package.is_vocabulary_compatible);
}

#[tokio::test]
async fn test_minor_vocabulary_difference_is_warning_not_quarantine() {
    let harness = TestHarness::new().await;
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    builder
        .vocabulary_versions
        .insert("claim_type".to_string(), "1.5.0".to_string());
    builder.push("persons", Uuid::new_v4(), json(person("أحمد", "الخالد", None)));
    let archive = harness.scratch_path("minorvocab.uhc");
    builder.write(&archive).await.close().await;

    let result = harness.upload(&archive, "minorvocab.uhc").await;
    assert!(result.success);
    assert!(!result.quarantined);
    assert_eq!(result.package.status, PackageStatus::Pending);
    assert!(!result.warnings.is_empty());
}
