// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Intake Service
//!
//! Explicit composition of the pipeline: one struct holds the typed
//! collaborators every use case consumes, and the service wires the stage
//! handlers on top. No reflection, no handler registry - the pipeline is
//! plain structs calling plain structs.

use bytes::Bytes;
use futures::Stream;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use tenure_intake_domain::entities::{CommitReport, DuplicateReport, ValidationReport};
use tenure_intake_domain::repositories::{
    ConflictRepository, ImportPackageRepository, ProductionReader, StagingRepository,
};
use tenure_intake_domain::services::ports::{AuditSink, BlobStore, Clock, VocabularyRegistry};
use tenure_intake_domain::IntakeError;

use crate::application::commands::{
    CancelPackageCommand, ConflictView, OperationOutcome, PackageSnapshot, ReceivePackageCommand,
    ResolveConflictCommand, StagedEntityView, UploadResult,
};
use crate::application::use_cases::cancel_package::CancelPackageUseCase;
use crate::application::use_cases::commit_package::CommitPackageUseCase;
use crate::application::use_cases::detect_duplicates::DetectDuplicatesUseCase;
use crate::application::use_cases::queries::IntakeQueries;
use crate::application::use_cases::receive_package::ReceivePackageUseCase;
use crate::application::use_cases::resolve_conflict::ResolveConflictUseCase;
use crate::application::use_cases::validate_package::ValidatePackageUseCase;
use crate::infrastructure::config::IntakeConfig;
use crate::infrastructure::engines::{CommitEngine, MergeEngine};
use crate::infrastructure::repositories::{
    SqliteConflictRepository, SqliteImportPackageRepository, SqliteProductionReader,
    SqliteStagingRepository,
};
use crate::infrastructure::services::{
    FsBlobStore, PackageLockRegistry, SignatureVerifier, SqliteAuditSink, SqliteCounterService,
    StaticVocabularyRegistry, SystemClock,
};

/// Collaborators shared by the use cases.
pub struct IntakeDeps {
    pub packages: Arc<dyn ImportPackageRepository>,
    pub staging: Arc<dyn StagingRepository>,
    pub conflicts: Arc<dyn ConflictRepository>,
    pub production: Arc<dyn ProductionReader>,
    pub vocabulary: Arc<dyn VocabularyRegistry>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    pub counters: Arc<SqliteCounterService>,
    pub signature: Arc<SignatureVerifier>,
    pub locks: PackageLockRegistry,
    pub merge_engine: Arc<MergeEngine>,
    pub commit_engine: Arc<CommitEngine>,
    pub temp_dir: PathBuf,
}

/// Facade over the pipeline's operations, consumed by the HTTP layer.
pub struct IntakeService {
    receive: ReceivePackageUseCase,
    validate: ValidatePackageUseCase,
    detect: DetectDuplicatesUseCase,
    resolve: ResolveConflictUseCase,
    commit: CommitPackageUseCase,
    cancel: CancelPackageUseCase,
    queries: IntakeQueries,
    deps: Arc<IntakeDeps>,
}

impl IntakeService {
    /// Wires the full pipeline from configuration and a migrated pool.
    pub fn from_config(pool: SqlitePool, config: &IntakeConfig) -> Result<Self, IntakeError> {
        let packages: Arc<dyn ImportPackageRepository> =
            Arc::new(SqliteImportPackageRepository::new(pool.clone()));
        let staging: Arc<dyn StagingRepository> = Arc::new(SqliteStagingRepository::new(pool.clone()));
        let conflicts: Arc<dyn ConflictRepository> =
            Arc::new(SqliteConflictRepository::new(pool.clone()));
        let production: Arc<dyn ProductionReader> =
            Arc::new(SqliteProductionReader::new(pool.clone()));
        let vocabulary: Arc<dyn VocabularyRegistry> = Arc::new(
            StaticVocabularyRegistry::from_domains(config.vocabulary_domains())?,
        );
        let audit: Arc<dyn AuditSink> = Arc::new(SqliteAuditSink::new(pool.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let counters = Arc::new(SqliteCounterService::new(pool.clone()));
        let signature = Arc::new(SignatureVerifier::new(
            config.signature.policy,
            config.signature.public_key_base64.as_deref(),
        )?);
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
            config.blob_dir.clone(),
            config.archive_dir.clone(),
            pool.clone(),
        ));
        let merge_engine = Arc::new(MergeEngine::new(pool.clone()));
        let commit_engine = Arc::new(CommitEngine::new(
            pool,
            staging.clone(),
            blob_store,
            counters.clone(),
            clock.clone(),
        ));

        let deps = Arc::new(IntakeDeps {
            packages,
            staging,
            conflicts,
            production,
            vocabulary,
            audit,
            clock,
            counters,
            signature,
            locks: PackageLockRegistry::new(),
            merge_engine,
            commit_engine,
            temp_dir: config.temp_dir.clone(),
        });
        Ok(Self::new(deps))
    }

    pub fn new(deps: Arc<IntakeDeps>) -> Self {
        IntakeService {
            receive: ReceivePackageUseCase::new(deps.clone()),
            validate: ValidatePackageUseCase::new(deps.clone()),
            detect: DetectDuplicatesUseCase::new(deps.clone()),
            resolve: ResolveConflictUseCase::new(deps.clone()),
            commit: CommitPackageUseCase::new(deps.clone()),
            cancel: CancelPackageUseCase::new(deps.clone()),
            queries: IntakeQueries::new(deps.clone()),
            deps,
        }
    }

    pub fn deps(&self) -> &Arc<IntakeDeps> {
        &self.deps
    }

    pub async fn receive_package<S>(
        &self,
        command: ReceivePackageCommand,
        source: S,
    ) -> Result<UploadResult, IntakeError>
    where
        S: Stream<Item = Result<Bytes, IntakeError>> + Unpin + Send,
    {
        self.receive.execute(command, source).await
    }

    pub async fn validate_package(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<ValidationReport>, IntakeError> {
        self.validate.execute(package_id, user_id).await
    }

    pub async fn detect_duplicates(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<DuplicateReport>, IntakeError> {
        self.detect.execute(package_id, user_id).await
    }

    pub async fn resolve_conflict(
        &self,
        command: ResolveConflictCommand,
    ) -> Result<OperationOutcome<ConflictView>, IntakeError> {
        self.resolve.execute(command).await
    }

    pub async fn commit_package(
        &self,
        package_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<OperationOutcome<CommitReport>, IntakeError> {
        self.commit.execute(package_id, user_id).await
    }

    pub async fn cancel_package(
        &self,
        command: CancelPackageCommand,
    ) -> Result<OperationOutcome<()>, IntakeError> {
        self.cancel.execute(command).await
    }

    pub async fn package(&self, id: Uuid) -> Result<PackageSnapshot, IntakeError> {
        self.queries.package(id).await
    }

    pub async fn packages(&self, offset: u32, limit: u32) -> Result<Vec<PackageSnapshot>, IntakeError> {
        self.queries.packages(offset, limit).await
    }

    pub async fn staged_entities(
        &self,
        package_id: Uuid,
    ) -> Result<BTreeMap<String, Vec<StagedEntityView>>, IntakeError> {
        self.queries.staged_entities(package_id).await
    }

    pub async fn conflicts(&self, package_id: Uuid) -> Result<Vec<ConflictView>, IntakeError> {
        self.queries.conflicts(package_id).await
    }
}
