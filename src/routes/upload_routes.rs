use crate::handlers::{
    finalize_upload_handler, init_upload_handler, upload_batch_handler, upload_chunk_handler,
    upload_single_handler,
};
use crate::models::{CHUNK_SIZE, MAX_BATCH_SIZE, MAX_FILE_SIZE};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::post, Router};

/// Room for multipart boundaries, part headers and text fields.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

fn body_limit(payload: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max((payload + MULTIPART_OVERHEAD) as usize)
}

/// 创建上传路由
pub fn create_upload_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload",
            post(upload_batch_handler).layer(body_limit(MAX_BATCH_SIZE)),
        )
        .route(
            "/api/upload-single",
            post(upload_single_handler).layer(body_limit(MAX_FILE_SIZE)),
        )
        .route("/api/upload/init", post(init_upload_handler))
        .route(
            "/api/upload/chunk",
            post(upload_chunk_handler).layer(body_limit(CHUNK_SIZE)),
        )
        .route("/api/upload/finalize", post(finalize_upload_handler))
}
