use crate::handlers::{get_backend_health, get_health};
use crate::state::AppState;
use axum::{routing::get, Router};

/// 创建健康检查路由
pub fn create_health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/ready", get(|| async { "Ready" }))
        .route("/live", get(|| async { "Live" }))
        .route("/api/health", get(get_backend_health))
}
