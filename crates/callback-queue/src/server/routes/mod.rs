//! API routes for the queue server

pub mod queue;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all queue API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/queue", post(queue::submit_job).get(queue::list_jobs))
        .route("/queue/stats", get(queue::queue_stats))
        .route("/queue/retry", post(queue::retry_failed))
        .route("/queue/:id", get(queue::get_job).delete(queue::delete_job))
}
