use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};

use crate::state::AppState;

/// Counts in-flight requests and turns new ones away once shutdown began.
pub async fn track_in_flight(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    if state.shutdown_coordinator.is_shutdown_in_progress() {
        tracing::warn!("Rejecting {} {} during shutdown", req.method(), req.uri());
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let _guard = state.shutdown_coordinator.begin_request();
    next.run(req).await
}
