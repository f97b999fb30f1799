//! Blob storage for uploaded receipt files.
//!
//! This crate provides the `Storage` trait and its backends. The rest of the
//! system addresses stored bytes only through opaque storage keys.
//!
//! # Storage key format
//!
//! All backends use the same key layout: `receipts/{file_id}_{filename}`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized
//! in the `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

pub use factory::create_storage;
pub use kvitto_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageError, StorageResult};
