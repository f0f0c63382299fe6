// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Attachment deduplication: identical-hash blobs across packages are
//! stored once and counted as saved bytes on the later commit.

mod common;

use common::{building, evidence, json, person, unit, TestHarness, UhcBuilder};
use std::path::Path;
use uuid::Uuid;

/// Package carrying one evidence with an attachment blob.
async fn upload_package_with_attachment(harness: &TestHarness, tag: u32, content: &[u8]) -> Uuid {
    let mut builder = UhcBuilder::new(Uuid::new_v4());
    let b = Uuid::new_v4();
    let u = Uuid::new_v4();
    let p = Uuid::new_v4();
    let mut bldg = building();
    bldg.building_number = format!("{:05}", tag);
    builder.push("buildings", b, json(bldg));
    builder.push("property_units", u, json(unit(b, "APT 1")));
    builder.push("persons", p, json(person("أحمد", "الخالد", Some(&format!("{}9", tag)))));
    let hash = builder.push_blob(content);
    builder.push("evidences", Uuid::new_v4(), json(evidence(p, &hash, content.len() as u64)));
    let archive = harness.scratch_path(&format!("blob-{}.uhc", tag));
    builder.write(&archive).await.close().await;
    harness.upload(&archive, "blob.uhc").await.package.id
}

fn count_files(dir: &Path) -> usize {
    let mut count = 0;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                count += count_files(&path);
            } else {
                count += 1;
            }
        }
    }
    count
}

#[tokio::test]
async fn test_shared_attachment_is_stored_once() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);
    let content = vec![0xA5u8; 4096];

    let first = upload_package_with_attachment(&harness, 40001, &content).await;
    harness.service.validate_package(first, user).await.unwrap();
    harness.service.detect_duplicates(first, user).await.unwrap();
    let report = harness
        .service
        .commit_package(first, user)
        .await
        .unwrap()
        .report
        .unwrap();
    assert_eq!(report.attachments_reused, 0);
    assert_eq!(report.deduplication_bytes_saved, 0);
    assert_eq!(count_files(&harness.config.blob_dir), 1);

    let second = upload_package_with_attachment(&harness, 40002, &content).await;
    harness.service.validate_package(second, user).await.unwrap();
    harness.service.detect_duplicates(second, user).await.unwrap();
    let report = harness
        .service
        .commit_package(second, user)
        .await
        .unwrap()
        .report
        .unwrap();
    assert_eq!(report.attachments_reused, 1);
    assert!(report.deduplication_bytes_saved >= content.len() as u64);

    // Exactly one blob on disk per distinct hash.
    assert_eq!(count_files(&harness.config.blob_dir), 1);
}

#[tokio::test]
async fn test_distinct_attachments_are_both_stored() {
    let harness = TestHarness::new().await;
    let user = Some(harness.user_id);

    let first = upload_package_with_attachment(&harness, 40003, b"deed scan A").await;
    harness.service.validate_package(first, user).await.unwrap();
    harness.service.detect_duplicates(first, user).await.unwrap();
    harness.service.commit_package(first, user).await.unwrap();

    let second = upload_package_with_attachment(&harness, 40004, b"deed scan B").await;
    harness.service.validate_package(second, user).await.unwrap();
    harness.service.detect_duplicates(second, user).await.unwrap();
    let report = harness
        .service
        .commit_package(second, user)
        .await
        .unwrap()
        .report
        .unwrap();
    assert_eq!(report.attachments_reused, 0);
    assert_eq!(count_files(&harness.config.blob_dir), 2);
}
