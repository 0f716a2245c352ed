use crate::handlers::{generate_proposal_handler, get_system_status};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_system_routes() -> Router<AppState> {
    Router::new()
        .route("/api/system/status", get(get_system_status))
        .route("/api/generate", post(generate_proposal_handler))
}
