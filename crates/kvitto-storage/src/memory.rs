//! In-process memory storage.
//!
//! Holds uploaded bytes in a map behind a mutex. Used by the test suites and
//! by database-less development runs; contents do not survive a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::keys::generate_storage_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;

#[derive(Clone)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    base_url: String,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: "memory://receipts".to_string(),
        }
    }

    /// Number of stored objects (test helper).
    pub fn len(&self) -> usize {
        self.objects.lock().expect("storage lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the bytes behind a key while keeping the key absent rather than
    /// empty; lets tests simulate a registry row whose blob went missing.
    pub fn remove(&self, storage_key: &str) {
        self.objects
            .lock()
            .expect("storage lock poisoned")
            .remove(storage_key);
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(
        &self,
        file_id: Uuid,
        filename: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)> {
        let key = generate_storage_key(file_id, filename);
        let url = self.generate_url(&key);

        self.objects
            .lock()
            .expect("storage lock poisoned")
            .insert(key.clone(), data);

        tracing::debug!(key = %key, "Memory storage upload successful");

        Ok((key, url))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .expect("storage lock poisoned")
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .lock()
            .expect("storage lock poisoned")
            .contains_key(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects
            .lock()
            .expect("storage lock poisoned")
            .remove(storage_key);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        let data = b"receipt bytes".to_vec();

        let (key, url) = storage
            .upload(Uuid::new_v4(), "receipt.pdf", "application/pdf", data.clone())
            .await
            .unwrap();

        assert!(url.starts_with("memory://"));
        assert_eq!(storage.download(&key).await.unwrap(), data);
        assert!(storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_storage_missing_key() {
        let storage = MemoryStorage::new();
        let result = storage.download("receipts/nope.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("receipts/nope.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_storage_remove_simulates_lost_blob() {
        let storage = MemoryStorage::new();
        let (key, _) = storage
            .upload(Uuid::new_v4(), "receipt.pdf", "application/pdf", b"x".to_vec())
            .await
            .unwrap();

        storage.remove(&key);
        assert!(matches!(
            storage.download(&key).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
