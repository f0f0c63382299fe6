// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite repository implementations.

pub mod schema;
pub mod sqlite_conflict_repository;
pub mod sqlite_import_package_repository;
pub mod sqlite_production_reader;
pub mod sqlite_staging_repository;

pub use sqlite_conflict_repository::SqliteConflictRepository;
pub use sqlite_import_package_repository::SqliteImportPackageRepository;
pub use sqlite_production_reader::SqliteProductionReader;
pub use sqlite_staging_repository::SqliteStagingRepository;
