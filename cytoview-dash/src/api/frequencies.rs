//! Frequency table endpoint

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::db::{self, FrequencyFilter, FrequencyRow};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FrequencyResponse {
    pub samples: usize,
    pub records: usize,
    pub rows: Vec<FrequencyRow>,
}

/// GET /api/frequencies?project&condition&treatment&sample_type&population
///
/// Per (sample, population) relative frequencies with metadata. Unknown
/// filter values yield an empty row set, not an error.
pub async fn get_frequencies(
    State(state): State<AppState>,
    Query(filter): Query<FrequencyFilter>,
) -> ApiResult<Json<FrequencyResponse>> {
    let rows = db::frequency_table(&state.db, &filter).await?;

    let samples: BTreeSet<&str> = rows.iter().map(|r| r.sample.as_str()).collect();

    Ok(Json(FrequencyResponse {
        samples: samples.len(),
        records: rows.len(),
        rows,
    }))
}
