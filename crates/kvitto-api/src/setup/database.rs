//! Repository setup: Postgres when configured, in-memory otherwise.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kvitto_core::Config;
use kvitto_db::{
    ensure_schema, MemoryStore, PgReceiptFileRepository, PgReceiptRepository,
    ReceiptFileRepository, ReceiptRepository,
};
use sqlx::postgres::PgPoolOptions;

/// Build the file registry and receipt store from configuration.
pub async fn setup_repositories(
    config: &Config,
) -> Result<(Arc<dyn ReceiptFileRepository>, Arc<dyn ReceiptRepository>)> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await
                .context("Failed to connect to database")?;

            ensure_schema(&pool)
                .await
                .context("Failed to ensure database schema")?;

            tracing::info!(
                max_connections = config.db_max_connections,
                "Database connection established"
            );

            Ok((
                Arc::new(PgReceiptFileRepository::new(pool.clone())),
                Arc::new(PgReceiptRepository::new(pool)),
            ))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; using the in-memory registry and receipt store (non-durable)"
            );
            let store = MemoryStore::new();
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
    }
}
