mod api;
mod common;

pub use api::api_routes;
pub use common::common_routes;

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};

async fn not_found() -> AppError {
    AppError::NotFound("route".into())
}

/// The whole application: common routes at the root and the API under `/api`.
/// Unknown paths answer with the standard 404 error body.
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.max_body_bytes;
    Router::new()
        .merge(common_routes())
        .nest("/api", api_routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
