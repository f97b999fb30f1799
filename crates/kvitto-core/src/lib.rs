//! Core domain types for the kvitto receipt service.
//!
//! This crate holds the domain models (`ReceiptFile`, `Receipt`), the unified
//! `AppError` type with its HTTP-facing metadata, and the environment-driven
//! service configuration. It has no I/O of its own; the storage, database,
//! and processing crates build on these types.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
