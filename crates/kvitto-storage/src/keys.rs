//! Shared key generation for storage backends.
//!
//! Key format: `receipts/{file_id}_{filename}`.

use uuid::Uuid;

/// Generate a storage key for the given file id and sanitized filename.
///
/// All backends must use this format for consistency.
pub fn generate_storage_key(file_id: Uuid, filename: &str) -> String {
    format!("receipts/{}_{}", file_id, filename)
}
