use axum::{middleware::from_fn, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::request_meta;

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
///
/// CORS is wide open for the `/api` subtree only, matching how the
/// recommendation endpoints are consumed from browser frontends.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/status", get(handlers::status))
        .route("/recommendations", get(handlers::recommendations))
        .route("/users", get(handlers::users))
        .route("/courses", get(handlers::courses))
        .layer(cors);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(request_meta)),
        )
        .with_state(state)
}
