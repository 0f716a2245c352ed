use crate::error::{ProxyError, ProxyResult};
use crate::models::{
    chunk_fields, ChunkAck, ChunkInitRequest, ChunkInitResponse, FinalizeRequest,
    FinalizeResponse,
};
use crate::services::{ChunkDisposition, ChunkSessionService};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use bytes::Bytes;
use serde_json::Value;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ProxyResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ProxyError::BadRequest(rejection.body_text()))
}

/// First string found under any of `keys`.
fn string_field(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// POST /api/upload/init
pub async fn init_upload_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChunkInitRequest>, JsonRejection>,
) -> ProxyResult<Json<ChunkInitResponse>> {
    let request = json_body(payload)?;
    tracing::info!(
        "Chunked upload init received: {} ({} bytes, {} chunks)",
        request.file_name,
        request.total_bytes,
        request.total_chunks
    );
    ChunkSessionService::validate_init(&request)?;

    let path = state.backend.config().chunk_init_path.clone();
    let body = serde_json::to_value(&request)
        .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let response = state.backend.post_json(&path, &body).await?;

    let upload_id = string_field(&response, &["uploadId", "upload_id"]).ok_or_else(|| {
        ProxyError::InvalidResponse(format!("init response carries no uploadId: {}", response))
    })?;
    state.sessions.register(&upload_id, &request);

    Ok(Json(ChunkInitResponse { upload_id }))
}

/// POST /api/upload/chunk
///
/// Multipart fields: `uploadId`, `chunkIndex`, `chunk`.
pub async fn upload_chunk_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ProxyResult<Json<ChunkAck>> {
    let mut upload_id: Option<String> = None;
    let mut chunk_index: Option<u64> = None;
    let mut chunk: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            chunk_fields::UPLOAD_ID => upload_id = Some(field.text().await?),
            chunk_fields::CHUNK_INDEX => {
                let raw = field.text().await?;
                let index = raw.trim().parse::<u64>().map_err(|_| {
                    ProxyError::BadRequest(format!(
                        "chunkIndex must be a non-negative integer, got {}",
                        raw
                    ))
                })?;
                chunk_index = Some(index);
            }
            chunk_fields::CHUNK => chunk = Some(field.bytes().await?),
            other => tracing::debug!("Ignoring multipart field {}", other),
        }
    }

    let upload_id =
        upload_id.ok_or_else(|| ProxyError::BadRequest("uploadId is required".into()))?;
    let chunk_index =
        chunk_index.ok_or_else(|| ProxyError::BadRequest("chunkIndex is required".into()))?;
    let chunk = chunk.ok_or_else(|| ProxyError::BadRequest("chunk is required".into()))?;
    let len = chunk.len() as u64;

    tracing::info!(
        "Chunk {} received for upload {} ({} bytes)",
        chunk_index,
        upload_id,
        len
    );

    let ack = match state.sessions.check_chunk(&upload_id, chunk_index, len)? {
        ChunkDisposition::Replay => state.sessions.commit_chunk(&upload_id, chunk_index, len)?,
        ChunkDisposition::Relay => {
            // commit must happen while the index is still reserved
            let _reserved = state.sessions.reservation(&upload_id, chunk_index);
            state
                .backend
                .forward_chunk(&upload_id, chunk_index, chunk)
                .await?;
            state.sessions.commit_chunk(&upload_id, chunk_index, len)?
        }
    };
    Ok(Json(ack))
}

/// POST /api/upload/finalize
pub async fn finalize_upload_handler(
    State(state): State<AppState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> ProxyResult<Json<FinalizeResponse>> {
    let request = json_body(payload)?;
    tracing::info!("Finalize received for upload {}", request.upload_id);

    let entry = state.sessions.check_finalize(&request.upload_id)?;

    let path = state.backend.config().chunk_finalize_path.clone();
    let body = serde_json::to_value(&request)
        .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let response = state.backend.post_json(&path, &body).await?;

    let url = string_field(&response, &["url", "file_url", "public_url", "artifact_id"])
        .ok_or_else(|| {
            ProxyError::InvalidResponse(format!("finalize response carries no url: {}", response))
        })?;

    state.sessions.complete(&request.upload_id);
    tracing::info!(
        "Upload {} of {} ({} bytes) finalized: {}",
        request.upload_id,
        entry.file_name,
        entry.total_bytes,
        url
    );

    Ok(Json(FinalizeResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_first_match() {
        let body = json!({"upload_id": "abc", "other": 1});
        assert_eq!(
            string_field(&body, &["uploadId", "upload_id"]),
            Some("abc".to_string())
        );
        assert_eq!(string_field(&body, &["other"]), None);
    }
}
