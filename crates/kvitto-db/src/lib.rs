//! Registry and receipt store for the kvitto pipeline.
//!
//! The repository traits defined here are the single source of truth for file
//! lifecycle state and extracted receipts. Two implementations exist: a
//! Postgres one (sqlx) and an in-memory one used by tests and database-less
//! development runs. Both provide read-after-write consistency within a
//! single process, and both commit the processed flag and the receipt row as
//! one atomic step.

pub mod memory;
pub mod pg;
pub mod repository;

pub use memory::MemoryStore;
pub use pg::{ensure_schema, PgReceiptFileRepository, PgReceiptRepository};
pub use repository::{processing_conflict, ReceiptFileRepository, ReceiptRepository};
