//! Dataset summary endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::db::{self, ConditionSummaryRow, DatasetSummary};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub dataset: DatasetSummary,
    pub conditions: Vec<ConditionSummaryRow>,
}

/// GET /api/summary
///
/// Store-wide totals, load provenance, and per-condition breakdown.
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<SummaryResponse>> {
    let dataset = db::dataset_summary(&state.db).await?;
    let conditions = db::condition_summary(&state.db).await?;

    Ok(Json(SummaryResponse {
        dataset,
        conditions,
    }))
}
