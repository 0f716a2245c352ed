pub mod health_routes;
pub mod system_routes;
pub mod upload_routes;

pub use health_routes::*;
pub use system_routes::*;
pub use upload_routes::*;

use crate::middleware::{cors_layer, log_requests, track_in_flight};
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Full proxy application with every route and middleware attached.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(create_health_routes())
        .merge(create_upload_routes())
        .merge(create_system_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                .layer(axum::middleware::from_fn(log_requests))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    track_in_flight,
                )),
        )
        .with_state(state)
}
