//! Aggregation queries over the normalized trial store
//!
//! Optional equality filters use the `(? IS NULL OR col = ?)` pattern with
//! each value bound twice, keeping every function a single static statement.

use cytoview_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Optional equality filters for the frequency table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrequencyFilter {
    pub project: Option<String>,
    pub condition: Option<String>,
    pub treatment: Option<String>,
    pub sample_type: Option<String>,
    pub population: Option<String>,
}

/// Optional cohort filters for responder and baseline analyses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohortFilter {
    pub condition: Option<String>,
    pub sample_type: Option<String>,
    pub treatment: Option<String>,
}

/// Filters for the average-count query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AverageCountFilter {
    pub population: Option<String>,
    pub condition: Option<String>,
    pub sex: Option<String>,
    pub response: Option<String>,
    pub time_from_treatment_start: Option<i64>,
}

/// One (sample, population) measurement with relative frequency and metadata
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FrequencyRow {
    pub sample: String,
    pub project_id: String,
    pub condition: String,
    pub treatment: Option<String>,
    pub sample_type: String,
    pub total_count: i64,
    pub population: String,
    pub count: i64,
    pub percentage: f64,
}

/// Per-sample relative frequency with the subject's response
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ResponderRow {
    pub sample_id: String,
    pub population: String,
    pub percentage: f64,
    pub response: Option<String>,
}

/// A baseline sample with subject metadata
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BaselineSampleRow {
    pub sample_id: String,
    pub project_id: String,
    pub subject_id: String,
    pub response: Option<String>,
    pub sex: String,
}

/// Aggregations over the baseline cohort
#[derive(Debug, Clone, Serialize)]
pub struct BaselineBreakdown {
    pub samples_per_project: BTreeMap<String, i64>,
    pub subjects_by_response: BTreeMap<String, i64>,
    pub subjects_by_sex: BTreeMap<String, i64>,
}

/// Per-condition totals
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConditionSummaryRow {
    pub condition: String,
    pub subjects: i64,
    pub samples: i64,
    pub measurements: i64,
    pub total_cells: i64,
}

/// Store-wide totals plus load provenance
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub projects: i64,
    pub subjects: i64,
    pub samples: i64,
    pub populations: i64,
    pub measurements: i64,
    pub load_info: BTreeMap<String, String>,
}

/// Distinct values for the dashboard filter widgets
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub projects: Vec<String>,
    pub conditions: Vec<String>,
    pub treatments: Vec<String>,
    pub sample_types: Vec<String>,
    pub populations: Vec<String>,
}

/// Relative frequency of each cell population per sample, with metadata
///
/// Percentage is the population's count over the sample's total count,
/// rounded to 2 decimals. Ordered by sample then population.
pub async fn frequency_table(
    pool: &SqlitePool,
    filter: &FrequencyFilter,
) -> Result<Vec<FrequencyRow>> {
    let rows = sqlx::query_as::<_, FrequencyRow>(
        r#"
        SELECT cc.sample_id AS sample,
               sub.project_id,
               sub.condition,
               sub.treatment,
               s.sample_type,
               t.total_count,
               cc.population,
               cc.count,
               COALESCE(ROUND(cc.count * 100.0 / NULLIF(t.total_count, 0), 2), 0.0)
                   AS percentage
        FROM cell_counts cc
        JOIN (SELECT sample_id, SUM(count) AS total_count
              FROM cell_counts
              GROUP BY sample_id) t ON t.sample_id = cc.sample_id
        JOIN samples s ON cc.sample_id = s.id
        JOIN subjects sub ON s.subject_id = sub.id
        WHERE (? IS NULL OR sub.project_id = ?)
          AND (? IS NULL OR sub.condition = ?)
          AND (? IS NULL OR sub.treatment = ?)
          AND (? IS NULL OR s.sample_type = ?)
          AND (? IS NULL OR cc.population = ?)
        ORDER BY cc.sample_id, cc.population
        "#,
    )
    .bind(&filter.project)
    .bind(&filter.project)
    .bind(&filter.condition)
    .bind(&filter.condition)
    .bind(&filter.treatment)
    .bind(&filter.treatment)
    .bind(&filter.sample_type)
    .bind(&filter.sample_type)
    .bind(&filter.population)
    .bind(&filter.population)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-sample relative frequencies with responses, for a cohort
///
/// Feeds the significance tests in [`crate::stats`].
pub async fn responder_frequencies(
    pool: &SqlitePool,
    filter: &CohortFilter,
) -> Result<Vec<ResponderRow>> {
    let rows = sqlx::query_as::<_, ResponderRow>(
        r#"
        SELECT cc.sample_id,
               cc.population,
               COALESCE(ROUND(cc.count * 100.0 /
                   NULLIF(SUM(cc.count) OVER (PARTITION BY cc.sample_id), 0), 2), 0.0)
                   AS percentage,
               sub.response
        FROM cell_counts cc
        JOIN samples s ON cc.sample_id = s.id
        JOIN subjects sub ON s.subject_id = sub.id
        WHERE (? IS NULL OR sub.condition = ?)
          AND (? IS NULL OR s.sample_type = ?)
          AND (? IS NULL OR sub.treatment = ?)
        ORDER BY cc.sample_id, cc.population
        "#,
    )
    .bind(&filter.condition)
    .bind(&filter.condition)
    .bind(&filter.sample_type)
    .bind(&filter.sample_type)
    .bind(&filter.treatment)
    .bind(&filter.treatment)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Samples taken at treatment start (time_from_treatment_start = 0)
pub async fn baseline_samples(
    pool: &SqlitePool,
    filter: &CohortFilter,
) -> Result<Vec<BaselineSampleRow>> {
    let rows = sqlx::query_as::<_, BaselineSampleRow>(
        r#"
        SELECT s.id AS sample_id,
               sub.project_id,
               sub.id AS subject_id,
               sub.response,
               sub.sex
        FROM samples s
        JOIN subjects sub ON s.subject_id = sub.id
        WHERE s.time_from_treatment_start = 0
          AND (? IS NULL OR sub.condition = ?)
          AND (? IS NULL OR s.sample_type = ?)
          AND (? IS NULL OR sub.treatment = ?)
        ORDER BY s.id
        "#,
    )
    .bind(&filter.condition)
    .bind(&filter.condition)
    .bind(&filter.sample_type)
    .bind(&filter.sample_type)
    .bind(&filter.treatment)
    .bind(&filter.treatment)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Aggregate a baseline cohort: samples per project, subjects by response
/// and by sex
///
/// Subject-level breakdowns count each subject once, however many samples
/// they contributed.
pub fn baseline_breakdown(rows: &[BaselineSampleRow]) -> BaselineBreakdown {
    let mut samples_per_project: BTreeMap<String, i64> = BTreeMap::new();
    for row in rows {
        *samples_per_project.entry(row.project_id.clone()).or_insert(0) += 1;
    }

    let mut seen: BTreeMap<&str, &BaselineSampleRow> = BTreeMap::new();
    for row in rows {
        seen.entry(row.subject_id.as_str()).or_insert(row);
    }

    let mut subjects_by_response: BTreeMap<String, i64> = BTreeMap::new();
    let mut subjects_by_sex: BTreeMap<String, i64> = BTreeMap::new();
    for row in seen.values() {
        if let Some(response) = &row.response {
            *subjects_by_response.entry(response.clone()).or_insert(0) += 1;
        }
        *subjects_by_sex.entry(row.sex.clone()).or_insert(0) += 1;
    }

    BaselineBreakdown {
        samples_per_project,
        subjects_by_response,
        subjects_by_sex,
    }
}

/// Mean raw count for one population across matching samples
///
/// Returns None when no rows match. Rounded to 2 decimals.
pub async fn average_population_count(
    pool: &SqlitePool,
    filter: &AverageCountFilter,
) -> Result<Option<f64>> {
    let avg: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT ROUND(AVG(cc.count), 2)
        FROM cell_counts cc
        JOIN samples s ON cc.sample_id = s.id
        JOIN subjects sub ON s.subject_id = sub.id
        WHERE (? IS NULL OR cc.population = ?)
          AND (? IS NULL OR sub.condition = ?)
          AND (? IS NULL OR sub.sex = ?)
          AND (? IS NULL OR sub.response = ?)
          AND (? IS NULL OR s.time_from_treatment_start = ?)
        "#,
    )
    .bind(&filter.population)
    .bind(&filter.population)
    .bind(&filter.condition)
    .bind(&filter.condition)
    .bind(&filter.sex)
    .bind(&filter.sex)
    .bind(&filter.response)
    .bind(&filter.response)
    .bind(filter.time_from_treatment_start)
    .bind(filter.time_from_treatment_start)
    .fetch_one(pool)
    .await?;

    Ok(avg)
}

/// One row per distinct condition with subject/sample/measurement totals
pub async fn condition_summary(pool: &SqlitePool) -> Result<Vec<ConditionSummaryRow>> {
    let rows = sqlx::query_as::<_, ConditionSummaryRow>(
        r#"
        SELECT sub.condition,
               COUNT(DISTINCT sub.id) AS subjects,
               COUNT(DISTINCT s.id) AS samples,
               COUNT(cc.guid) AS measurements,
               COALESCE(SUM(cc.count), 0) AS total_cells
        FROM subjects sub
        LEFT JOIN samples s ON s.subject_id = sub.id
        LEFT JOIN cell_counts cc ON cc.sample_id = s.id
        GROUP BY sub.condition
        ORDER BY sub.condition
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Store-wide totals plus load provenance from the load_info table
pub async fn dataset_summary(pool: &SqlitePool) -> Result<DatasetSummary> {
    let projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;
    let subjects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subjects")
        .fetch_one(pool)
        .await?;
    let samples: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM samples")
        .fetch_one(pool)
        .await?;
    let populations: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT population) FROM cell_counts")
            .fetch_one(pool)
            .await?;
    let measurements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cell_counts")
        .fetch_one(pool)
        .await?;

    let info_rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT key, value FROM load_info ORDER BY key")
            .fetch_all(pool)
            .await?;
    let load_info = info_rows
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();

    Ok(DatasetSummary {
        projects,
        subjects,
        samples,
        populations,
        measurements,
        load_info,
    })
}

/// Distinct projects, conditions, treatments, sample types, and populations
pub async fn filter_options(pool: &SqlitePool) -> Result<FilterOptions> {
    let projects: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT id FROM projects ORDER BY id")
            .fetch_all(pool)
            .await?;
    let conditions: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT condition FROM subjects ORDER BY condition")
            .fetch_all(pool)
            .await?;
    let treatments: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT treatment FROM subjects WHERE treatment IS NOT NULL ORDER BY treatment",
    )
    .fetch_all(pool)
    .await?;
    let sample_types: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT sample_type FROM samples ORDER BY sample_type")
            .fetch_all(pool)
            .await?;
    let populations: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT population FROM cell_counts ORDER BY population")
            .fetch_all(pool)
            .await?;

    Ok(FilterOptions {
        projects,
        conditions,
        treatments,
        sample_types,
        populations,
    })
}
