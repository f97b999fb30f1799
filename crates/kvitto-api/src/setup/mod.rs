//! Application setup and initialization
//!
//! All application initialization logic lives here rather than in main.rs,
//! for organization and testability.

pub mod database;
pub mod routes;
pub mod server;
pub mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use kvitto_core::Config;
use kvitto_processing::{create_extractor, ReceiptPipeline, UploadPolicy};

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    validate_config(&config).context("Configuration validation failed")?;

    tracing::info!("Configuration loaded and validated successfully");

    // Registry and receipt store (Postgres, or in-memory without DATABASE_URL)
    let (files, receipts) = database::setup_repositories(&config).await?;

    // Blob storage
    let storage = kvitto_storage::create_storage(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage: {}", e))?;

    // Extraction backend
    let extractor = create_extractor(&config).context("Failed to initialize extractor")?;
    tracing::info!(extractor = extractor.name(), "Extraction backend ready");

    let pipeline = Arc::new(ReceiptPipeline::new(
        storage,
        files,
        receipts,
        extractor,
        UploadPolicy {
            max_file_size: config.max_receipt_size_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
            allowed_content_types: config.allowed_content_types.clone(),
        },
    ));

    let state = Arc::new(AppState {
        pipeline,
        config: config.clone(),
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

fn validate_config(config: &Config) -> Result<()> {
    if config.allowed_extensions.is_empty() {
        anyhow::bail!("RECEIPT_ALLOWED_EXTENSIONS must not be empty");
    }
    if config.allowed_content_types.is_empty() {
        anyhow::bail!("RECEIPT_ALLOWED_CONTENT_TYPES must not be empty");
    }
    if config.max_receipt_size_bytes == 0 {
        anyhow::bail!("MAX_RECEIPT_SIZE_BYTES must be greater than zero");
    }
    if config.storage_backend == kvitto_core::StorageBackend::Local
        && config.local_storage_path.is_empty()
    {
        anyhow::bail!("LOCAL_STORAGE_PATH must be set for local storage");
    }
    Ok(())
}
