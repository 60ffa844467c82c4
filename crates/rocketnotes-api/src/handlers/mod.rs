//! HTTP handlers for rocketnotes-api.

pub mod documents;
pub mod readers;
pub mod trees;
pub mod user_config;
pub mod zettels;

use axum::Json;
use serde_json::json;

/// Liveness check.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
