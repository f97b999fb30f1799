//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use kvitto_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

/// URL prefix for the pipeline routes.
pub const API_PREFIX: &str = "/api/v0";

/// Slack added on top of the upload limit for multipart framing overhead.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Server-level concurrency cap to protect against resource exhaustion.
const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let body_limit = config.max_receipt_size_bytes + BODY_LIMIT_SLACK;

    let api = Router::new()
        .route("/upload", post(handlers::upload::upload_receipt_file))
        .route("/validate", get(handlers::validate::validate_receipt_file))
        .route("/process", post(handlers::process::process_receipt_file))
        .route(
            "/receipt-files",
            get(handlers::receipt_files::list_receipt_files),
        )
        .route("/receipts", get(handlers::receipts::list_receipts))
        .route("/receipts/{id}", get(handlers::receipts::get_receipt));

    let router = Router::new()
        .route("/health", get(handlers::health::health))
        .nest(API_PREFIX, api)
        .with_state(state)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/docs"))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit));

    Ok(router)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST];

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any))
}
