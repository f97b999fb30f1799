//! Storage backend identifiers shared between configuration and the storage crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Available blob storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem storage
    Local,
    /// In-process memory storage (tests and database-less development runs)
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_round_trip() {
        assert_eq!("local".parse::<StorageBackend>(), Ok(StorageBackend::Local));
        assert_eq!(
            "MEMORY".parse::<StorageBackend>(),
            Ok(StorageBackend::Memory)
        );
        assert_eq!(StorageBackend::Local.to_string(), "local");
    }

    #[test]
    fn test_backend_unknown() {
        assert!("s3".parse::<StorageBackend>().is_err());
    }
}
