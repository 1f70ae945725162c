//! Webhook HTTP surface.

mod middleware;
mod state;
mod webhook;

pub use state::WebhookState;
pub use webhook::WebhookError;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};

use middleware::{log_deliveries, set_request_context};

pub fn build_router(state: WebhookState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/revalidate", post(webhook::revalidate))
        .route("/api/search-index", post(webhook::search_index))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_deliveries))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
