pub mod server_handlers;

pub use server_handlers::{
    create_server, delete_server, get_server, health, list_servers, update_server,
    ServerResponse,
};

use crate::{middleware::add_security_headers, AppState};
use axum::{middleware, routing::get, Router};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Builds the API router. `request_timeout` bounds each whole request; a
/// request that times out is abandoned wherever it got to, with no rollback.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health))
        .route("/servers", get(list_servers).post(create_server))
        .route(
            "/servers/{name}",
            get(get_server).put(update_server).delete(delete_server),
        )
        .layer(middleware::from_fn(add_security_headers))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
