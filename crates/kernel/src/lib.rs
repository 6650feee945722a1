//! Forum bridge kernel library.
//!
//! Report intake and report URL topic fields for a Discourse-style forum.
//! The `forum-bridge` binary wires these into an HTTP server.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod settings;
pub mod state;
pub mod store;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Build the full application router.
///
/// Middleware order (last added = first executed):
/// TraceLayer → load_site_settings → routes (some with require_api_key).
/// `/health` sits outside the settings layer so it still answers when the
/// store is unreachable.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::reports::router(&state))
        .merge(routes::topics::router(&state))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::load_site_settings,
        ))
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
