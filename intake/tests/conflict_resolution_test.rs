// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Duplicate detection and conflict resolution: merge with FK repointing,
//! write-once decisions, keep-separate suppression, and commit gating.

mod common;

use common::{building, claim, json, person, unit, TestHarness, UhcBuilder};
use uuid::Uuid;

use tenure_intake::application::commands::{CancelPackageCommand, ResolveConflictCommand};
use tenure_intake::domain::entities::{ConflictDecision, PackageStatus};
use tenure_intake::domain::IntakeError;

fn resolve_command(
    conflict_id: Uuid,
    decision: ConflictDecision,
    master: Option<Uuid>,
    user: Option<Uuid>,
) -> ResolveConflictCommand {
    ResolveConflictCommand {
        conflict_id,
        decision,
        chosen_master_id: master,
        justification: "reviewed against the paper registry".to_string(),
        user_id: user,
    }
}

/// Package with one person sharing a national id with production, plus the
/// claim that person filed.
async fn upload_package_with_person(harness: &TestHarness, tag: u32, national_id: &str) -> Uuid {
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    let b = Uuid::new_v4();
    let u = Uuid::new_v4();
    let p = Uuid::new_v4();
    let mut bldg = building();
    bldg.building_number = format!("{:05}", tag);
    builder.push("buildings", b, json(bldg));
    builder.push("property_units", u, json(unit(b, "APT 1")));
    builder.push("persons", p, json(person("أحمد", "الخالد", Some(national_id))));
    builder.push("claims", Uuid::new_v4(), json(claim(p, u)));
    let archive = harness.scratch_path(&format!("conflict-{}.uhc", tag));
    builder.write(&archive).await.close().await;
    harness.upload(&archive, "conflict.uhc").await.package.id
}

#[tokio::test]
async fn test_matching_national_id_creates_one_conflict_at_full_score() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let master = harness.seed_production_person(&person("أحمد", "الخالد", Some("9001"))).await;

    let id = upload_package_with_person(&harness, 30001, "9001").await;
    harness.service.validate_package(id, user).await.unwrap();
    let detected = harness.service.detect_duplicates(id, user).await.unwrap();
    assert_eq!(detected.package.status, PackageStatus::ReviewingConflicts);

    let conflicts = harness.service.conflicts(id).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].similarity_score, 100);
    assert_eq!(conflicts[0].suggested_master_id, master);
    assert_eq!(conflicts[0].decision, ConflictDecision::Unresolved);
}

#[tokio::test]
async fn test_commit_attempt_with_open_conflicts_fails_unresolved() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    harness.seed_production_person(&person("أحمد", "الخالد", Some("9002"))).await;

    let id = upload_package_with_person(&harness, 30002, "9002").await;
    harness.service.validate_package(id, user).await.unwrap();
    harness.service.detect_duplicates(id, user).await.unwrap();

    let err = harness.service.commit_package(id, user).await.unwrap_err();
    assert!(matches!(err, IntakeError::ConflictUnresolved(_)));
    // Status unchanged.
    let snapshot = harness.service.package(id).await.unwrap();
    assert_eq!(snapshot.status, PackageStatus::ReviewingConflicts);
}

#[tokio::test]
async fn test_merge_repoints_and_claim_references_master() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    // Master has no father name recorded; the merge should fill it from
    // the staging row while keeping master values for everything else.
    let mut master_record = person("أحمد", "الخالد", Some("9003"));
    master_record.father_name = None;
    let master = harness.seed_production_person(&master_record).await;

    let id = upload_package_with_person(&harness, 30003, "9003").await;
    harness.service.validate_package(id, user).await.unwrap();
    harness.service.detect_duplicates(id, user).await.unwrap();
    let conflicts = harness.service.conflicts(id).await.unwrap();
    let staging_original = conflicts[0].staging_original_id;

    // A relation from an earlier package already references the staging
    // identity; the merge must repoint it to the master.
    sqlx::query(
        "INSERT INTO production_person_property_relations (id, person_id, property_unit_id, data) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(staging_original.to_string())
    .bind(Uuid::new_v4().to_string())
    .bind(format!("{{\"person_id\":\"{}\"}}", staging_original))
    .execute(&harness.pool)
    .await
    .unwrap();

    let resolved = harness
        .service
        .resolve_conflict(resolve_command(conflicts[0].id, ConflictDecision::Merge, Some(master), user))
        .await
        .unwrap();
    assert!(resolved.success);
    assert_eq!(resolved.package.status, PackageStatus::ReadyToCommit);

    // The dangling reference now points at the master.
    let repointed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM production_person_property_relations WHERE person_id = ?",
    )
    .bind(master.to_string())
    .fetch_one(&harness.pool)
    .await
    .unwrap();
    assert_eq!(repointed, 1);

    // Empty master field was filled from the staging row.
    let data: String = sqlx::query_scalar("SELECT data FROM production_persons WHERE id = ?")
        .bind(master.to_string())
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert!(data.contains("محمد"), "father name filled from staging");

    // Commit: the person is skipped, the claim references the master.
    let committed = harness.service.commit_package(id, user).await.unwrap();
    let report = committed.report.unwrap();
    assert_eq!(report.merges_performed, 1);
    let claimant: String = sqlx::query_scalar("SELECT primary_claimant_id FROM production_claims")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(claimant, master.to_string());

    // Exactly one production person: no duplicate was created.
    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM production_persons")
        .fetch_one(&harness.pool)
        .await
        .unwrap();
    assert_eq!(persons, 1);
}

#[tokio::test]
async fn test_decisions_are_write_once() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let master = harness.seed_production_person(&person("أحمد", "الخالد", Some("9004"))).await;

    let id = upload_package_with_person(&harness, 30004, "9004").await;
    harness.service.validate_package(id, user).await.unwrap();
    harness.service.detect_duplicates(id, user).await.unwrap();
    let conflicts = harness.service.conflicts(id).await.unwrap();

    harness
        .service
        .resolve_conflict(resolve_command(
            conflicts[0].id,
            ConflictDecision::LinkToExisting,
            Some(master),
            user,
        ))
        .await
        .unwrap();

    let err = harness
        .service
        .resolve_conflict(resolve_command(conflicts[0].id, ConflictDecision::KeepSeparate, None, user))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::ConflictAlreadyResolved(_)));
}

#[tokio::test]
async fn test_keep_separate_suppresses_redetection() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    harness.seed_production_person(&person("أحمد", "الخالد", Some("9005"))).await;

    // First package: detect, keep separate, then cancel without commit.
    let first = upload_package_with_person(&harness, 30005, "9005").await;
    harness.service.validate_package(first, user).await.unwrap();
    harness.service.detect_duplicates(first, user).await.unwrap();
    let conflicts = harness.service.conflicts(first).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    harness
        .service
        .resolve_conflict(resolve_command(conflicts[0].id, ConflictDecision::KeepSeparate, None, user))
        .await
        .unwrap();
    harness
        .service
        .cancel_package(CancelPackageCommand {
            package_id: first,
            reason: "re-uploading after review".to_string(),
            cleanup_staging: true,
            user_id: user,
        })
        .await
        .unwrap();

    // Identical person in a later package: the reviewed pair is not
    // re-surfaced while its detection keys are unchanged.
    let second = upload_package_with_person(&harness, 30006, "9005").await;
    harness.service.validate_package(second, user).await.unwrap();
    let detected = harness.service.detect_duplicates(second, user).await.unwrap();
    assert_eq!(detected.package.status, PackageStatus::ReadyToCommit);
    assert!(harness.service.conflicts(second).await.unwrap().is_empty());
}
