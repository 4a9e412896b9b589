use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::StatusState;

pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::render_metrics))
        .route("/odds", get(handlers::odds))
        .route("/odds/recent", get(handlers::recent_updates))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
