//! Log Correlation Stream Agent
//!
//! HTTP surface over the correlation engine: push ingestion, file tails,
//! remote fetches, live bundle stream (SSE), batch preprocess, status and
//! one-shot file reads.
//! Bind to 127.0.0.1 by default (local only).

mod error;
mod fetch;
mod handlers;
mod state;
mod types;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::AgentError;
pub use handlers::{
  fetch_remote, health, ingest, live, preprocess, read_logs, start_tail, status, stop_tail,
};
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/stream/ingest", post(ingest))
    .route("/stream/tail", post(start_tail))
    .route("/stream/tail/:id", delete(stop_tail))
    .route("/stream/fetch", post(fetch_remote))
    .route("/stream/status", get(status))
    .route("/stream/live", get(live))
    .route("/logs", get(read_logs))
    .route("/logs/preprocess", post(preprocess))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
