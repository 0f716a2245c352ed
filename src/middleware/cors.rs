use tower_http::cors::{Any, CorsLayer};

/// The wizard is served from a different origin than the proxy in development.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
