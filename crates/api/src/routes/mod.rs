pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate          POST  run a generation request (repeat-aware)
/// /reroll            POST  re-run a recorded request with overrides
/// /history           GET   recent submissions, newest first
/// /models/{kind}     GET   backend model files for a folder
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(handlers::generation::generate))
        .route("/reroll", post(handlers::generation::reroll))
        .route("/history", get(handlers::history::list_history))
        .route("/models/{kind}", get(handlers::models::list_models))
}
