// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenure Intake
//!
//! Implementation crate of the package intake pipeline: application use
//! cases, SQLite infrastructure, the `.uhc` container reader, the
//! transactional commit and merge engines, and the HTTP surface.
//!
//! ## Pipeline
//!
//! ```text
//! upload ──► receive ──► validate (load + 6 levels) ──► detect duplicates
//!                                                             │
//!                              ┌──────────────────────────────┤
//!                              ▼                              ▼
//!                      resolve conflicts ────────────► commit ──► archive
//! ```
//!
//! The domain model lives in `tenure-intake-domain`; this crate supplies
//! the *how*: sqlx persistence, content-addressed blob storage, Ed25519
//! signature verification, per-package advisory locks, and axum handlers.

pub mod application;
pub mod infrastructure;
pub mod presentation;

// Re-export the domain crate for consumers and tests
pub use tenure_intake_domain as domain;

pub use crate::application::services::{IntakeDeps, IntakeService};
pub use crate::infrastructure::config::IntakeConfig;
pub use crate::presentation::{intake_router, AppState};
