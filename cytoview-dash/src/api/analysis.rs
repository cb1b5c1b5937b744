//! Statistical analysis endpoints: responder comparison, baseline cohort,
//! and average population count

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use crate::db::{
    self, AverageCountFilter, BaselineBreakdown, BaselineSampleRow, CohortFilter, ResponderRow,
};
use crate::error::ApiResult;
use crate::stats::{self, SignificanceRow};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ResponderResponse {
    pub rows: Vec<ResponderRow>,
    pub significance: Vec<SignificanceRow>,
}

/// GET /api/analysis/responders?condition&sample_type&treatment
///
/// Relative frequencies for the cohort plus per-population Mann-Whitney U
/// tests of responders vs non-responders.
pub async fn get_responder_analysis(
    State(state): State<AppState>,
    Query(filter): Query<CohortFilter>,
) -> ApiResult<Json<ResponderResponse>> {
    let rows = db::responder_frequencies(&state.db, &filter).await?;
    let significance = stats::significance_tests(&rows);

    Ok(Json(ResponderResponse { rows, significance }))
}

#[derive(Debug, Serialize)]
pub struct BaselineResponse {
    pub samples: Vec<BaselineSampleRow>,
    pub breakdown: BaselineBreakdown,
}

/// GET /api/analysis/baseline?condition&sample_type&treatment
///
/// Samples at time_from_treatment_start = 0 for the cohort, with project,
/// response, and sex breakdowns.
pub async fn get_baseline_analysis(
    State(state): State<AppState>,
    Query(filter): Query<CohortFilter>,
) -> ApiResult<Json<BaselineResponse>> {
    let samples = db::baseline_samples(&state.db, &filter).await?;
    let breakdown = db::baseline_breakdown(&samples);

    Ok(Json(BaselineResponse { samples, breakdown }))
}

#[derive(Debug, Serialize)]
pub struct AverageCountResponse {
    pub average_count: Option<f64>,
}

/// GET /api/analysis/average-count?population&condition&sex&response&time_from_treatment_start
///
/// Mean raw count across matching samples; null when nothing matches.
pub async fn get_average_count(
    State(state): State<AppState>,
    Query(filter): Query<AverageCountFilter>,
) -> ApiResult<Json<AverageCountResponse>> {
    let average_count = db::average_population_count(&state.db, &filter).await?;

    Ok(Json(AverageCountResponse { average_count }))
}
