// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end pipeline tests: the happy path through every stage, commit
//! atomicity under an injected FK failure, state-machine gating, and
//! cancellation semantics.

mod common;

use common::{building, claim, json, person, unit, TestHarness, UhcBuilder};
use chrono::Datelike;
use uuid::Uuid;

use tenure_intake::application::commands::CancelPackageCommand;
use tenure_intake::domain::entities::PackageStatus;
use tenure_intake::domain::IntakeError;

/// Archive with 1 building, 2 units, 3 persons, 1 claim. The `tag` keeps
/// building codes and national ids distinct between fixture packages so
/// runs do not collide in production. Returns the package surrogate id.
async fn upload_happy_archive(harness: &TestHarness, tag: u32) -> Uuid {
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    let b = Uuid::new_v4();
    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    let p3 = Uuid::new_v4();
    let mut bldg = building();
    bldg.building_number = format!("{:05}", tag);
    builder.push("buildings", b, json(bldg));
    builder.push("property_units", u1, json(unit(b, "APT 1")));
    builder.push("property_units", u2, json(unit(b, "APT 2")));
    builder.push("persons", p1, json(person("أحمد", "الخالد", Some(&format!("{}01", tag)))));
    builder.push("persons", p2, json(person("سعاد", "الخالد", Some(&format!("{}02", tag)))));
    builder.push("persons", p3, json(person("خالد", "العمر", None)));
    builder.push("claims", Uuid::new_v4(), json(claim(p1, u1)));
    let archive = harness.scratch_path(&format!("happy-{}.uhc", tag));
    builder.write(&archive).await.close().await;

    let result = harness.upload(&archive, "happy.uhc").await;
    assert_eq!(result.package.status, PackageStatus::Pending);
    result.package.id
}

#[tokio::test]
async fn test_happy_path_to_completed_and_archived() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let id = upload_happy_archive(&harness, 10006).await;

    let validated = harness.service.validate_package(id, user).await.unwrap();
    assert!(validated.success);
    assert_eq!(validated.package.status, PackageStatus::Validated);
    let report = validated.report.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.valid_rows + report.warning_rows, 7);

    let detected = harness.service.detect_duplicates(id, user).await.unwrap();
    assert_eq!(detected.package.status, PackageStatus::ReadyToCommit);
    assert!(detected.report.unwrap().bypassed_review);

    let committed = harness.service.commit_package(id, user).await.unwrap();
    assert_eq!(committed.package.status, PackageStatus::Completed);
    let report = committed.report.unwrap();
    assert_eq!(report.committed_total(), 7);
    assert_eq!(report.failed_total(), 0);
    assert!(report.is_fully_successful());

    // Archived under archives/YYYY/MM/<PackageId>.uhc.
    let snapshot = harness.service.package(id).await.unwrap();
    assert!(snapshot.is_archived);
    let now = chrono::Utc::now();
    let expected_relative = format!(
        "{:04}/{:02}/{}.uhc",
        now.year(),
        now.month(),
        snapshot.package_id
    );
    assert_eq!(snapshot.archive_path.as_deref(), Some(expected_relative.as_str()));
    assert!(harness.config.archive_dir.join(&expected_relative).exists());

    // Production rows are live: the claim carries a claim number and a
    // normalized status.
    let (claim_number, data): (String, String) =
        sqlx::query_as("SELECT claim_number, data FROM production_claims")
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert!(claim_number.starts_with("CLM-"));
    assert!(data.contains("draft-pending-submission"));
}

#[tokio::test]
async fn test_commit_rolls_back_on_unresolvable_fk() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let id = upload_happy_archive(&harness, 10007).await;
    harness.service.validate_package(id, user).await.unwrap();
    harness.service.detect_duplicates(id, user).await.unwrap();

    // Inject a FK-translation failure: drop the staged units after
    // validation so the claim's property unit cannot resolve.
    sqlx::query("DELETE FROM staging_property_units WHERE import_package_id = ?")
        .bind(id.to_string())
        .execute(&harness.pool)
        .await
        .unwrap();

    let err = harness.service.commit_package(id, user).await.unwrap_err();
    assert!(matches!(err, IntakeError::FkUnresolvable(_)));

    let snapshot = harness.service.package(id).await.unwrap();
    assert_eq!(snapshot.status, PackageStatus::CommitFailed);

    // Nothing from the package is visible in production.
    for table in ["production_buildings", "production_persons", "production_claims"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&harness.pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "{} must be empty after rollback", table);
    }
}

#[tokio::test]
async fn test_stage_order_is_enforced() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let id = upload_happy_archive(&harness, 10008).await;

    // Detection before validation is an invalid transition.
    let err = harness.service.detect_duplicates(id, user).await.unwrap_err();
    assert!(matches!(err, IntakeError::StateTransitionInvalid(_)));

    // Commit before the pipeline reaches ReadyToCommit is rejected too.
    let err = harness.service.commit_package(id, user).await.unwrap_err();
    assert!(matches!(err, IntakeError::StateTransitionInvalid(_)));

    let snapshot = harness.service.package(id).await.unwrap();
    assert_eq!(snapshot.status, PackageStatus::Pending);
}

#[tokio::test]
async fn test_mutations_require_a_user() {
    let harness = TestHarness::new().await;
    let id = upload_happy_archive(&harness, 10009).await;
    let err = harness.service.validate_package(id, None).await.unwrap_err();
    assert!(matches!(err, IntakeError::NotAuthenticated(_)));
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_cleans_staging() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let id = upload_happy_archive(&harness, 10010).await;
    harness.service.validate_package(id, user).await.unwrap();

    let staged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staging_persons WHERE import_package_id = ?")
        .bind(id.to_string())
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(staged, 3);

    let first = harness
        .service
        .cancel_package(CancelPackageCommand {
            package_id: id,
            reason: "operator abort".to_string(),
            cleanup_staging: true,
            user_id: user,
        })
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.package.status, PackageStatus::Cancelled);

    let staged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staging_persons WHERE import_package_id = ?")
        .bind(id.to_string())
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(staged, 0);

    // Second cancel: success, no state change, first reason kept.
    let second = harness
        .service
        .cancel_package(CancelPackageCommand {
            package_id: id,
            reason: "a different reason".to_string(),
            cleanup_staging: false,
            user_id: user,
        })
        .await
        .unwrap();
    assert!(second.success);
    assert_eq!(second.package.status, PackageStatus::Cancelled);
    assert_eq!(second.package.status_reason.as_deref(), Some("operator abort"));
}

#[tokio::test]
async fn test_claim_numbers_are_distinct_across_packages() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);

    let mut numbers = Vec::new();
    for tag in [20011, 20012] {
        let id = upload_happy_archive(&harness, tag).await;
        harness.service.validate_package(id, user).await.unwrap();
        let detected = harness.service.detect_duplicates(id, user).await.unwrap();
        assert_eq!(detected.package.status, PackageStatus::ReadyToCommit);
        let committed = harness.service.commit_package(id, user).await.unwrap();
        assert_eq!(committed.report.unwrap().committed_total(), 7);
    }

    let rows: Vec<(String,)> = sqlx::query_as("SELECT claim_number FROM production_claims")
        .fetch_all(&harness.pool)
        .await
        .unwrap();
    numbers.extend(rows.into_iter().map(|(n,)| n));
    assert_eq!(numbers.len(), 2);
    assert_ne!(numbers[0], numbers[1]);
}
