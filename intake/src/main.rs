// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Service entry point: configuration, tracing, database, HTTP listener.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tenure_intake::infrastructure::repositories::schema;
use tenure_intake::{intake_router, AppState, IntakeConfig, IntakeService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("INTAKE_CONFIG").ok();
    let config = IntakeConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!(database = config.database_url.as_str(), "starting tenure intake service");

    let pool = schema::initialize_database(&config.database_url)
        .await
        .context("initializing database")?;

    for dir in [&config.temp_dir, &config.archive_dir, &config.blob_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let service = Arc::new(IntakeService::from_config(pool, &config).context("wiring intake service")?);
    let router = intake_router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(address = config.bind_address.as_str(), "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving")?;
    Ok(())
}
