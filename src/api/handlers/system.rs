//! System endpoints: health check and the pack catalog.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::pack;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/packs` — The subscription tier catalog.
#[utoipa::path(
    get,
    path = "/config/packs",
    tag = "System",
    summary = "List subscription packs",
    description = "Returns the static tier table: quotas, display priorities, CPC terms, and \
                   feature flags.",
    responses(
        (status = 200, description = "Pack catalog", body = serde_json::Value),
    )
)]
pub async fn packs_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(pack::all_packs()))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/packs", get(packs_handler))
}
