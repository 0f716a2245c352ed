use crate::state::AppState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub in_flight_requests: usize,
    pub active_chunk_sessions: usize,
    pub shutdown_in_progress: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /api/system/status
pub async fn get_system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let shutting_down = state.shutdown_coordinator.is_shutdown_in_progress();
    Json(SystemStatus {
        status: if shutting_down {
            "shutting_down".to_string()
        } else {
            "running".to_string()
        },
        in_flight_requests: state.shutdown_coordinator.in_flight_count(),
        active_chunk_sessions: state.sessions.active_count(),
        shutdown_in_progress: shutting_down,
        timestamp: crate::utils::current_time(),
    })
}
