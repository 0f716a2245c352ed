use crate::error::{ProxyError, ProxyResult};
use crate::models::{
    bytes_to_mb, extract_file_urls, UploadResponse, FILES_FIELD, MAX_BATCH_SIZE, MAX_FILE_SIZE,
    METHOD_STANDARD,
};
use crate::services::ForwardFile;
use crate::state::AppState;
use crate::utils::describe_files;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

/// Reads every `files` part of the body, enforcing the per-file and batch caps.
pub async fn collect_files(mut multipart: Multipart) -> ProxyResult<Vec<ForwardFile>> {
    let mut files = Vec::new();
    let mut total: u64 = 0;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != FILES_FIELD {
            tracing::debug!("Ignoring multipart field {}", field_name);
            continue;
        }

        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await?;

        let size = data.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(ProxyError::PayloadTooLarge(format!(
                "{} is {} MB, exceeding the {} MB limit",
                name,
                bytes_to_mb(size),
                bytes_to_mb(MAX_FILE_SIZE)
            )));
        }
        total += size;
        if total > MAX_BATCH_SIZE {
            return Err(ProxyError::PayloadTooLarge(format!(
                "batch exceeds the {} MB limit",
                bytes_to_mb(MAX_BATCH_SIZE)
            )));
        }

        files.push(ForwardFile {
            name,
            content_type,
            data,
        });
    }

    if files.is_empty() {
        return Err(ProxyError::BadRequest("No files provided".into()));
    }
    Ok(files)
}

/// POST /api/upload
///
/// Forwards the whole batch to the backend's document upload endpoint in one
/// request and normalizes the answer into a `file name -> reference` map.
pub async fn upload_batch_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ProxyResult<Json<UploadResponse>> {
    let files = collect_files(multipart).await?;
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    tracing::info!(
        "Batch upload received: {} files: {}",
        files.len(),
        describe_files(files.iter().map(|f| (f.name.as_str(), f.len())))
    );

    let path = state.backend.config().upload_path.clone();
    let body = state.backend.forward_files(&path, files).await?;

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        tracing::error!("Backend rejected batch upload: {}", body);
        return Err(ProxyError::Backend {
            status: StatusCode::BAD_GATEWAY,
            body,
        });
    }

    let file_urls = extract_file_urls(&body, &names);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Uploaded {} documents successfully", names.len()));

    Ok(Json(UploadResponse {
        success: true,
        file_urls: Some(file_urls),
        message: Some(message),
        upload_method: METHOD_STANDARD.to_string(),
    }))
}

/// POST /api/upload-single
///
/// Exactly one file; the backend's JSON is returned as-is.
pub async fn upload_single_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ProxyResult<Json<Value>> {
    let mut files = collect_files(multipart).await?;
    if files.len() != 1 {
        return Err(ProxyError::BadRequest(format!(
            "expected exactly one file, got {}",
            files.len()
        )));
    }
    let file = files.remove(0);
    tracing::info!(
        "Single-file upload received: {}",
        describe_files([(file.name.as_str(), file.len())])
    );

    let path = state.backend.config().single_upload_path.clone();
    let body = state.backend.forward_files(&path, vec![file]).await?;
    Ok(Json(body))
}
