use axum::{body::Body, http::header, http::Request, middleware::Next, response::IntoResponse};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Header used to correlate a proxy request across log lines.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs receipt and outcome of every request
pub async fn log_requests(mut req: Request<Body>, next: Next) -> impl IntoResponse {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Ok(value) = request_id.parse() {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let content_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!(
        "[{}] Incoming request: {} {} (content-length: {})",
        request_id, method, uri, content_length
    );

    for (name, value) in req.headers().iter() {
        if *name == header::AUTHORIZATION || *name == header::COOKIE {
            continue;
        }
        match value.to_str() {
            Ok(value_str) => debug!("[{}] Header: {}: {}", request_id, name, value_str),
            Err(_) => debug!("[{}] Header: {}: (binary data)", request_id, name),
        }
    }

    let mut response = next.run(req).await;

    let status = response.status();
    info!(
        "[{}] Response status for {} {}: {}",
        request_id, method, uri, status
    );
    if status.is_client_error() || status.is_server_error() {
        error!(
            "[{}] Error response for {} {}: {}",
            request_id, method, uri, status
        );
    }

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
