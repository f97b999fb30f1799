//! Configuration module
//!
//! Environment-driven configuration for the API and pipeline services.
//! `.env` files are honored via dotenvy; every setting has a development
//! default except the Anthropic credentials.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_MAX_RECEIPT_SIZE_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_ANTHROPIC_VISION_MODEL: &str = "claude-sonnet-4-20250514";

/// Extraction backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorBackend {
    /// Local text extraction with layout heuristics
    Text,
    /// Anthropic vision model
    Vision,
}

impl FromStr for ExtractorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ExtractorBackend::Text),
            "vision" => Ok(ExtractorBackend::Vision),
            other => Err(format!("unknown extractor backend: {}", other)),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Postgres connection string. When absent, the service runs on the
    /// in-memory registry and receipt store (single-process, non-durable).
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Upload policy
    pub max_receipt_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    // Extraction configuration
    pub extractor_backend: ExtractorBackend,
    pub anthropic_api_key: Option<String>,
    pub anthropic_vision_model: String,
}

impl Config {
    /// Load configuration from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let server_port = parse_env("PORT", DEFAULT_SERVER_PORT)?;
        let cors_origins = parse_env_list("CORS_ORIGINS", &["*"]);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let db_max_connections = parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value
                .parse::<StorageBackend>()
                .map_err(|e| anyhow::anyhow!("STORAGE_BACKEND: {}", e))?,
            Err(_) => StorageBackend::Local,
        };
        let local_storage_path =
            env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./data/receipts".to_string());
        let local_storage_base_url = env::var("LOCAL_STORAGE_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/files", server_port));

        let max_receipt_size_bytes =
            parse_env("MAX_RECEIPT_SIZE_BYTES", DEFAULT_MAX_RECEIPT_SIZE_BYTES)?;
        let allowed_extensions = parse_env_list("RECEIPT_ALLOWED_EXTENSIONS", &["pdf"]);
        let allowed_content_types =
            parse_env_list("RECEIPT_ALLOWED_CONTENT_TYPES", &["application/pdf"]);

        let extractor_backend = match env::var("EXTRACTOR_BACKEND") {
            Ok(value) => value
                .parse::<ExtractorBackend>()
                .map_err(|e| anyhow::anyhow!("EXTRACTOR_BACKEND: {}", e))?,
            Err(_) => ExtractorBackend::Text,
        };
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty());
        let anthropic_vision_model = env::var("ANTHROPIC_VISION_MODEL")
            .unwrap_or_else(|_| DEFAULT_ANTHROPIC_VISION_MODEL.to_string());

        Ok(Config {
            server_port,
            cors_origins,
            environment,
            database_url,
            db_max_connections,
            storage_backend,
            local_storage_path,
            local_storage_base_url,
            max_receipt_size_bytes,
            allowed_extensions,
            allowed_content_types,
            extractor_backend,
            anthropic_api_key,
            anthropic_vision_model,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn parse_env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
