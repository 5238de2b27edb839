//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;
mod state;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

pub use routes::create_router;
pub use state::{AppState, Policies};

/// Full application router: `/health` plus the `/api/v1` surface
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> context -> rate limit -> handler
    let api_routes = create_router()
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::context_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
