use std::sync::Arc;

use kvitto_core::Config;

use crate::{Storage, StorageBackend, StorageError, StorageResult};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            if config.local_storage_path.is_empty() {
                return Err(StorageError::ConfigError(
                    "LOCAL_STORAGE_PATH not configured".to_string(),
                ));
            }
            let storage = crate::LocalStorage::new(
                config.local_storage_path.clone(),
                config.local_storage_base_url.clone(),
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(crate::MemoryStorage::new())),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)".to_string(),
        )),
    }
}
