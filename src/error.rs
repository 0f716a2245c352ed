use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::Value;
use thiserror::Error;

use crate::models::ErrorBody;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("unknown upload session: {0}")]
    SessionNotFound(String),

    #[error("chunk {got} out of order for upload {upload_id}, expected {expected}")]
    ChunkOutOfOrder {
        upload_id: String,
        expected: u64,
        got: u64,
    },

    #[error("chunk {chunk_index} of upload {upload_id} is already being relayed")]
    ChunkInFlight { upload_id: String, chunk_index: u64 },

    #[error("upload {upload_id} is incomplete: {received} of {total} chunks received")]
    Incomplete {
        upload_id: String,
        received: u64,
        total: u64,
    },

    /// The backend answered with a non-success status. `body` is its response, untouched.
    #[error("backend responded with {status}")]
    Backend { status: StatusCode, body: Value },

    #[error("backend did not respond within {0} seconds")]
    Timeout(u64),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::ChunkOutOfOrder { .. }
            | ProxyError::ChunkInFlight { .. }
            | ProxyError::Incomplete { .. } => StatusCode::CONFLICT,
            ProxyError::Backend { status, .. } => *status,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Unreachable(_) | ProxyError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Value {
        match self {
            ProxyError::Backend { body, .. } => body.clone(),
            ProxyError::ChunkOutOfOrder { expected, got, .. } => {
                serde_json::json!({ "expectedChunkIndex": expected, "chunkIndex": got })
            }
            ProxyError::Incomplete {
                received, total, ..
            } => serde_json::json!({ "receivedChunks": received, "totalChunks": total }),
            other => Value::String(other.to_string()),
        }
    }

    /// Short label for the `error` field. Backend errors keep the backend's own
    /// message when it has one.
    fn label(&self) -> String {
        match self {
            ProxyError::Backend { status, body } => body
                .get("error")
                .or_else(|| body.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!("Backend request failed with status {}", status.as_u16())
                }),
            other => other.to_string(),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ProxyError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ProxyError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.label(),
            details: self.details(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_error_keeps_status_and_body() {
        let err = ProxyError::Backend {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({"detail": "Unsupported file type: .exe"}),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.label(), "Unsupported file type: .exe");
        assert_eq!(err.details(), json!({"detail": "Unsupported file type: .exe"}));
    }

    #[test]
    fn test_backend_error_without_message() {
        let err = ProxyError::Backend {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Value::String("boom".into()),
        };
        assert_eq!(err.label(), "Backend request failed with status 500");
        assert_eq!(err.details(), json!("boom"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::SessionNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProxyError::ChunkOutOfOrder {
                upload_id: "x".into(),
                expected: 1,
                got: 3
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ProxyError::Timeout(600).status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
