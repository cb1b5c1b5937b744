//! cytoview-dash library - clinical-trial dashboard service
//!
//! Loads a denormalized cell-count CSV into a normalized SQLite store once at
//! startup, then serves aggregate statistics and an embedded dashboard page
//! over local HTTP.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod stats;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only after load)
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/api/summary", get(api::get_summary))
        .route("/api/filters", get(api::get_filter_options))
        .route("/api/frequencies", get(api::get_frequencies))
        .route("/api/analysis/responders", get(api::get_responder_analysis))
        .route("/api/analysis/baseline", get(api::get_baseline_analysis))
        .route("/api/analysis/average-count", get(api::get_average_count))
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/static/style.css", get(api::serve_style_css))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
