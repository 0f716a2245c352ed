use crate::state::AppState;
use crate::utils::timestamp;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health
///
/// Relays the backend's readiness; 503 while the backend is not answering 2xx.
pub async fn get_backend_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.backend.health().await {
        Ok(body) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "backend": body,
                "backend_url": state.backend.base_url(),
                "timestamp": timestamp(),
            })),
        ),
        Err(e) => {
            tracing::warn!("Backend health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "backend": "unreachable",
                    "backend_url": state.backend.base_url(),
                    "error": e.to_string(),
                    "timestamp": timestamp(),
                })),
            )
        }
    }
}
