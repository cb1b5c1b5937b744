//! Filter option lists for the dashboard widgets

use axum::{extract::State, Json};

use crate::db::{self, FilterOptions};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/filters
///
/// Distinct projects, conditions, treatments, sample types, and populations.
pub async fn get_filter_options(State(state): State<AppState>) -> ApiResult<Json<FilterOptions>> {
    let options = db::filter_options(&state.db).await?;
    Ok(Json(options))
}
