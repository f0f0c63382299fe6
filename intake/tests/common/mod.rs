// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Builds real `.uhc` containers (embedded SQLite, sealed with the canonical
//! content checksum) and wires an `IntakeService` over a temp database, the
//! way the exporter and the deployed service actually behave.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use tenure_intake::domain::entities::records::{
    BuildingRecord, ClaimRecord, EvidenceRecord, Gender, PersonPropertyRelationRecord, PersonRecord,
    PropertyUnitRecord,
};
use tenure_intake::domain::services::content_hash::{CanonicalHasher, CONTENT_HASH_TABLES};
use tenure_intake::domain::services::name_matching::family_name_prefix;
use tenure_intake::domain::value_objects::Sha256Checksum;
use tenure_intake::infrastructure::config::{
    IntakeConfig, SignatureSettings, VocabularyDomainSettings,
};
use tenure_intake::infrastructure::repositories::schema;
use tenure_intake::infrastructure::services::signature_verifier::SignaturePolicy;
use tenure_intake::IntakeService;

/// One staged entity row inside a fixture container.
#[derive(Clone)]
pub struct FixtureRow {
    pub id: Uuid,
    pub data: serde_json::Value,
}

/// Builds `.uhc` containers the way a field device's exporter does.
pub struct UhcBuilder {
    pub package_id: Uuid,
    pub device_id: String,
    pub vocabulary_versions: BTreeMap<String, String>,
    pub tables: BTreeMap<&'static str, Vec<FixtureRow>>,
    pub blobs: Vec<(String, Vec<u8>)>,
}

impl UhcBuilder {
    pub fn new(package_id: Uuid) -> Self {
        let mut vocabulary_versions = BTreeMap::new();
        vocabulary_versions.insert("claim_type".to_string(), "1.4.2".to_string());
        UhcBuilder {
            package_id,
            device_id: "tablet-017".to_string(),
            vocabulary_versions,
            tables: BTreeMap::new(),
            blobs: Vec::new(),
        }
    }

    pub fn push(&mut self, table: &'static str, id: Uuid, data: serde_json::Value) -> &mut Self {
        self.tables.entry(table).or_default().push(FixtureRow { id, data });
        self
    }

    pub fn push_blob(&mut self, content: &[u8]) -> String {
        let hash = Sha256Checksum::from_bytes(content);
        self.blobs.push((hash.as_str().to_string(), content.to_vec()));
        hash.as_str().to_string()
    }

    /// Writes the container, sealing it with the canonical checksum.
    pub async fn write(&self, path: &Path) -> SqlitePool {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();

        sqlx::query(
            "CREATE TABLE manifest (\
             package_id TEXT, schema_version TEXT, created_utc TEXT, exported_date_utc TEXT, \
             exported_by_user_id TEXT, device_id TEXT, total_record_count INTEGER, \
             entity_counts TEXT, total_attachment_size_bytes INTEGER, vocabulary_versions TEXT, \
             checksum TEXT, digital_signature TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for table in CONTENT_HASH_TABLES {
            if table == "attachment_blobs" {
                sqlx::query("CREATE TABLE attachment_blobs (hash TEXT PRIMARY KEY, content BLOB NOT NULL)")
                    .execute(&pool)
                    .await
                    .unwrap();
            } else {
                let ddl = format!("CREATE TABLE {} (id TEXT PRIMARY KEY, data TEXT NOT NULL)", table);
                sqlx::query(&ddl).execute(&pool).await.unwrap();
            }
        }

        let mut total_records = 0u64;
        let mut entity_counts: BTreeMap<String, u64> = BTreeMap::new();
        for (table, rows) in &self.tables {
            for row in rows {
                let insert = format!("INSERT INTO {} (id, data) VALUES (?, ?)", table);
                sqlx::query(&insert)
                    .bind(row.id.to_string())
                    .bind(row.data.to_string())
                    .execute(&pool)
                    .await
                    .unwrap();
            }
            entity_counts.insert(table.to_string(), rows.len() as u64);
            total_records += rows.len() as u64;
        }
        let mut attachment_bytes = 0u64;
        for (hash, content) in &self.blobs {
            sqlx::query("INSERT OR IGNORE INTO attachment_blobs (hash, content) VALUES (?, ?)")
                .bind(hash)
                .bind(content.as_slice())
                .execute(&pool)
                .await
                .unwrap();
            attachment_bytes += content.len() as u64;
        }

        let checksum = self.content_checksum();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO manifest VALUES (?, '1.0', ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(self.package_id.to_string())
        .bind(&now)
        .bind(&now)
        .bind(Uuid::new_v4().to_string())
        .bind(&self.device_id)
        .bind(total_records as i64)
        .bind(serde_json::to_string(&entity_counts).unwrap())
        .bind(attachment_bytes as i64)
        .bind(serde_json::to_string(&self.vocabulary_versions).unwrap())
        .bind(checksum.as_str())
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    /// Canonical checksum over the data tables, exactly as the server
    /// recomputes it: tables in fixed order, rows sorted by primary key
    /// (string order).
    pub fn content_checksum(&self) -> Sha256Checksum {
        let mut hasher = CanonicalHasher::new();
        for table in CONTENT_HASH_TABLES {
            if table == "attachment_blobs" {
                let mut blobs: Vec<_> = self.blobs.clone();
                blobs.sort_by(|a, b| a.0.cmp(&b.0));
                blobs.dedup_by(|a, b| a.0 == b.0);
                hasher.begin_table(table, blobs.len() as u64);
                for (hash, content) in &blobs {
                    hasher.blob_row(hash, content);
                }
            } else {
                let mut rows: Vec<(String, String)> = self
                    .tables
                    .get(table)
                    .map(|rows| {
                        rows.iter()
                            .map(|r| (r.id.to_string(), r.data.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                rows.sort_by(|a, b| a.0.cmp(&b.0));
                hasher.begin_table(table, rows.len() as u64);
                for (id, data) in &rows {
                    hasher.text_row(id, data);
                }
            }
        }
        hasher.finish()
    }
}

/// A wired service over temp directories plus its backing pool.
pub struct TestHarness {
    pub service: Arc<IntakeService>,
    pub pool: SqlitePool,
    pub config: IntakeConfig,
    pub user_id: Uuid,
    _root: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db_path = root.path().join("intake.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let mut vocabularies = BTreeMap::new();
        vocabularies.insert(
            "claim_type".to_string(),
            VocabularyDomainSettings {
                version: "1.4.2".to_string(),
                codes: vec!["ownership".to_string(), "tenancy".to_string()],
            },
        );

        let config = IntakeConfig {
            database_url: database_url.clone(),
            bind_address: "127.0.0.1:0".to_string(),
            temp_dir: root.path().join("spool"),
            archive_dir: root.path().join("archives"),
            blob_dir: root.path().join("blobs"),
            signature: SignatureSettings {
                policy: SignaturePolicy::Optional,
                public_key_base64: None,
            },
            vocabularies,
        };

        let pool = schema::initialize_database(&database_url).await.unwrap();
        for dir in [&config.temp_dir, &config.archive_dir, &config.blob_dir] {
            tokio::fs::create_dir_all(dir).await.unwrap();
        }
        let service = Arc::new(IntakeService::from_config(pool.clone(), &config).unwrap());
        TestHarness {
            service,
            pool,
            config,
            user_id: Uuid::new_v4(),
            _root: root,
        }
    }

    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.config.temp_dir.join(name)
    }

    /// Uploads a container file through the receive use case as an HTTP
    /// handler would: a chunked byte stream.
    pub async fn upload(
        &self,
        archive_path: &Path,
        file_name: &str,
    ) -> tenure_intake::application::commands::UploadResult {
        use futures::stream;
        use tenure_intake::application::commands::ReceivePackageCommand;
        use tenure_intake::domain::entities::ImportMethod;

        let bytes = tokio::fs::read(archive_path).await.unwrap();
        let chunks: Vec<Result<bytes::Bytes, tenure_intake::domain::IntakeError>> = bytes
            .chunks(64 * 1024)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        self.service
            .receive_package(
                ReceivePackageCommand {
                    file_name: file_name.to_string(),
                    import_method: ImportMethod::Manual,
                    user_id: Some(self.user_id),
                },
                stream::iter(chunks),
            )
            .await
            .unwrap()
    }

    /// Seeds one production person with its blocking-key columns, the way
    /// the commit engine writes them.
    pub async fn seed_production_person(&self, record: &PersonRecord) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO production_persons \
             (id, national_id, governorate_code, birth_year, gender, family_prefix, data) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(record.national_id.as_deref())
        .bind(record.governorate_code.as_deref())
        .bind(record.date_of_birth.map(|d| chrono::Datelike::year(&d)))
        .bind(record.gender.map(|g| g.to_string()))
        .bind(family_name_prefix(&record.family_name))
        .bind(serde_json::to_string(record).unwrap())
        .execute(&self.pool)
        .await
        .unwrap();
        id
    }
}

// --- record factories ------------------------------------------------------

pub fn building() -> BuildingRecord {
    BuildingRecord {
        governorate_code: "01".to_string(),
        district_code: "02".to_string(),
        sub_district_code: "03".to_string(),
        community_code: "004".to_string(),
        neighborhood_code: "005".to_string(),
        building_number: "00006".to_string(),
        building_type: None,
        number_of_floors: Some(2),
        number_of_units: Some(2),
        address_text: Some("شارع الجلاء".to_string()),
    }
}

pub fn unit(building_id: Uuid, identifier: &str) -> PropertyUnitRecord {
    PropertyUnitRecord {
        building_id,
        unit_identifier: identifier.to_string(),
        unit_type: None,
        floor_number: Some(1),
        area_square_meters: Some(84.5),
    }
}

pub fn person(first: &str, family: &str, national_id: Option<&str>) -> PersonRecord {
    PersonRecord {
        first_name: first.to_string(),
        father_name: Some("محمد".to_string()),
        family_name: family.to_string(),
        national_id: national_id.map(str::to_string),
        date_of_birth: Some(NaiveDate::from_ymd_opt(1985, 6, 1).unwrap()),
        gender: Some(Gender::Male),
        phone_number: None,
        nationality: None,
        governorate_code: Some("01".to_string()),
    }
}

pub fn claim(claimant: Uuid, property_unit: Uuid) -> ClaimRecord {
    ClaimRecord {
        primary_claimant_id: claimant,
        property_unit_id: property_unit,
        claim_type: Some("ownership".to_string()),
        status: Some("submitted".to_string()),
        claimed_share_percent: Some(100.0),
        submission_date: None,
    }
}

pub fn relation(person_id: Uuid, property_unit_id: Uuid) -> PersonPropertyRelationRecord {
    PersonPropertyRelationRecord {
        person_id,
        property_unit_id,
        relation_type: None,
        ownership_share_percent: Some(100.0),
        start_date: None,
    }
}

pub fn evidence(person_id: Uuid, attachment_hash: &str, size: u64) -> EvidenceRecord {
    EvidenceRecord {
        person_id: Some(person_id),
        evidence_type: None,
        attachment_hash: Some(attachment_hash.to_string()),
        attachment_size_bytes: Some(size),
        file_name: Some("deed.jpg".to_string()),
        issued_date: None,
    }
}

pub fn json(value: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}
