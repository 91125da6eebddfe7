//! The generic CRUD endpoint, with and without trailing slashes.

use crate::handlers::gateway::{count, create, destroy, list, partial_update, replace, retrieve};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn gateway_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/", get(list).post(create))
        .route("/api/v1", get(list).post(create))
        .route("/api/v1/count/", get(count))
        .route("/api/v1/count", get(count))
        .route(
            "/api/v1/:id/",
            get(retrieve).put(replace).patch(partial_update).delete(destroy),
        )
        .route(
            "/api/v1/:id",
            get(retrieve).put(replace).patch(partial_update).delete(destroy),
        )
        .with_state(state)
}
