use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

/// Liveness check. Reports cache reachability without failing on it.
#[utoipa::path(get, path = "/health", tag = "System",
    responses((status = 200, description = "Service is up")))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache = if state.service.cache_available().await {
        "available"
    } else {
        "unavailable"
    };
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": cache,
    }))
}
