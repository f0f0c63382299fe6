// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file
//! (`INTAKE_CONFIG` or `./intake.toml`), then `INTAKE_*` environment
//! overrides (`INTAKE_DATABASE_URL`, `INTAKE_SIGNATURE__POLICY`, ...).
//! Signature policy is server-wide; per-package policies do not exist.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use tenure_intake_domain::IntakeError;

use crate::infrastructure::services::signature_verifier::SignaturePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureSettings {
    pub policy: SignaturePolicy,
    /// Base64 Ed25519 public key of the fleet's export signing key.
    pub public_key_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VocabularyDomainSettings {
    pub version: String,
    #[serde(default)]
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    pub database_url: String,
    pub bind_address: String,
    /// Spool directory for uploads in flight.
    pub temp_dir: PathBuf,
    /// Root of `archives/YYYY/MM/` for committed containers.
    pub archive_dir: PathBuf,
    /// Root of the content-addressed attachment store.
    pub blob_dir: PathBuf,
    pub signature: SignatureSettings,
    /// Controlled vocabularies: domain → current version + code set.
    #[serde(default)]
    pub vocabularies: BTreeMap<String, VocabularyDomainSettings>,
}

impl IntakeConfig {
    /// Loads configuration from defaults, an optional file, and the
    /// environment.
    pub fn load(config_path: Option<&str>) -> Result<Self, IntakeError> {
        let mut builder = Config::builder()
            .set_default("database_url", "sqlite://./intake.db")
            .map_err(config_err)?
            .set_default("bind_address", "127.0.0.1:8080")
            .map_err(config_err)?
            .set_default("temp_dir", "./data/spool")
            .map_err(config_err)?
            .set_default("archive_dir", "./data/archives")
            .map_err(config_err)?
            .set_default("blob_dir", "./data/blobs")
            .map_err(config_err)?
            .set_default("signature.policy", "optional")
            .map_err(config_err)?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("intake").required(false));
        }
        builder = builder.add_source(Environment::with_prefix("INTAKE").separator("__"));

        builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)
    }

    /// Vocabulary settings as `(domain, version, codes)` triples for the
    /// registry.
    pub fn vocabulary_domains(&self) -> Vec<(String, String, Vec<String>)> {
        self.vocabularies
            .iter()
            .map(|(domain, settings)| {
                (domain.clone(), settings.version.clone(), settings.codes.clone())
            })
            .collect()
    }
}

fn config_err(e: config::ConfigError) -> IntakeError {
    IntakeError::InvalidConfiguration(e.to_string())
}
