//! Route assembly: the CRUD endpoint, operational routes and HTTP layers.

mod common;
mod gateway;

pub use common::common_routes;
pub use gateway::gateway_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Default cap on request bodies (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The complete application: every route plus tracing and a body size limit.
pub fn app(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .merge(gateway_routes(state.clone()))
        .merge(common_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}
