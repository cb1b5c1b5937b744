//! HTTP API handlers for cytoview-dash

pub mod analysis;
pub mod filters;
pub mod frequencies;
pub mod health;
pub mod summary;
pub mod ui;

pub use analysis::{get_average_count, get_baseline_analysis, get_responder_analysis};
pub use filters::get_filter_options;
pub use frequencies::get_frequencies;
pub use health::health_routes;
pub use summary::get_summary;
pub use ui::{serve_app_js, serve_index, serve_style_css};
