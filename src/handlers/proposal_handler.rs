use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

/// POST /api/generate
///
/// Relays the wizard's proposal request to the backend and returns
/// `{success, proposal, timestamp}` untouched.
pub async fn generate_proposal_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProxyResult<Json<Value>> {
    let Json(body) = payload.map_err(|rejection| ProxyError::BadRequest(rejection.body_text()))?;
    if !body.is_object() {
        return Err(ProxyError::BadRequest("request body must be a JSON object".into()));
    }
    tracing::info!("Proposal generation request received");

    let response = state.backend.generate_proposal(&body).await?;
    Ok(Json(response))
}
