//! UI serving routes
//!
//! Serves the embedded HTML/JS dashboard page

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

const INDEX_HTML: &str = include_str!("../ui/index.html");
const APP_JS: &str = include_str!("../ui/app.js");
const STYLE_CSS: &str = include_str!("../ui/style.css");

/// GET /
///
/// Serves the main dashboard page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /static/app.js
pub async fn serve_app_js() -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/javascript")],
        APP_JS,
    )
        .into_response()
}

/// GET /static/style.css
pub async fn serve_style_css() -> Response {
    (StatusCode::OK, [("content-type", "text/css")], STYLE_CSS).into_response()
}
