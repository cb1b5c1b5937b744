//! Integration tests for the CSV loader
//!
//! Covers idempotent reload, referential integrity, row-count expectations,
//! and fail-fast validation with rollback.

use cytoview_dash::ingest::load_csv;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER: &str = "project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell";

/// 2 projects, 3 subjects, 5 samples, 4 population columns
const FIXTURE_ROWS: &str = "\
prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0,100,200,300,400
prj1,sbj1,melanoma,62,M,miraclib,yes,s2,PBMC,7,110,210,310,410
prj1,sbj2,melanoma,55,F,miraclib,no,s3,PBMC,0,120,220,320,420
prj2,sbj3,carcinoma,48,M,,,s4,tumor,0,130,230,330,430
prj2,sbj3,carcinoma,48,M,,,s5,tumor,7,140,240,340,440
";

fn write_csv(dir: &TempDir, header: &str, rows: &str) -> PathBuf {
    let path = dir.path().join("cell-count.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", header).unwrap();
    write!(file, "{}", rows).unwrap();
    path
}

async fn setup_store(dir: &TempDir) -> SqlitePool {
    let db_path = dir.path().join("cytoview.db");
    cytoview_common::db::init_database(&db_path).await.unwrap()
}

async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_load_row_counts() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, HEADER, FIXTURE_ROWS);
    let pool = setup_store(&dir).await;

    let summary = load_csv(&pool, &csv).await.unwrap();
    assert_eq!(summary.projects, 2);
    assert_eq!(summary.subjects, 3);
    assert_eq!(summary.samples, 5);
    assert_eq!(summary.cell_counts, 20);

    assert_eq!(table_count(&pool, "projects").await, 2);
    assert_eq!(table_count(&pool, "subjects").await, 3);
    assert_eq!(table_count(&pool, "samples").await, 5);
    assert_eq!(table_count(&pool, "cell_counts").await, 20);
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, HEADER, FIXTURE_ROWS);
    let pool = setup_store(&dir).await;

    load_csv(&pool, &csv).await.unwrap();
    let counts_first = (
        table_count(&pool, "projects").await,
        table_count(&pool, "subjects").await,
        table_count(&pool, "samples").await,
        table_count(&pool, "cell_counts").await,
    );

    load_csv(&pool, &csv).await.unwrap();
    let counts_second = (
        table_count(&pool, "projects").await,
        table_count(&pool, "subjects").await,
        table_count(&pool, "samples").await,
        table_count(&pool, "cell_counts").await,
    );

    assert_eq!(counts_first, counts_second);
}

#[tokio::test]
async fn test_referential_integrity() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, HEADER, FIXTURE_ROWS);
    let pool = setup_store(&dir).await;
    load_csv(&pool, &csv).await.unwrap();

    let orphan_counts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM cell_counts cc
         WHERE cc.sample_id NOT IN (SELECT id FROM samples)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let orphan_samples: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM samples s
         WHERE s.subject_id NOT IN (SELECT id FROM subjects)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let orphan_subjects: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subjects sub
         WHERE sub.project_id NOT IN (SELECT id FROM projects)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(orphan_counts, 0);
    assert_eq!(orphan_samples, 0);
    assert_eq!(orphan_subjects, 0);
}

#[tokio::test]
async fn test_blank_treatment_and_response_load_as_null() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, HEADER, FIXTURE_ROWS);
    let pool = setup_store(&dir).await;
    load_csv(&pool, &csv).await.unwrap();

    let (treatment, response): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT treatment, response FROM subjects WHERE id = 'sbj3'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(treatment.is_none());
    assert!(response.is_none());
}

#[tokio::test]
async fn test_missing_column_fails_with_column_name() {
    let dir = TempDir::new().unwrap();
    let header = HEADER.replace("condition,", "");
    let rows = "prj1,sbj1,62,M,miraclib,yes,s1,PBMC,0,100,200,300,400\n";
    let csv = write_csv(&dir, &header, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    assert!(err.to_string().contains("condition"), "error was: {}", err);
    assert_eq!(table_count(&pool, "projects").await, 0);
}

#[tokio::test]
async fn test_negative_count_fails_and_rolls_back() {
    let dir = TempDir::new().unwrap();
    let rows = "\
prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0,100,200,300,400
prj1,sbj2,melanoma,55,F,miraclib,no,s2,PBMC,0,-5,220,320,420
";
    let csv = write_csv(&dir, HEADER, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("row 3"), "error was: {}", msg);
    assert!(msg.contains("b_cell"), "error was: {}", msg);

    // The whole load rolls back, including the valid first row
    assert_eq!(table_count(&pool, "projects").await, 0);
    assert_eq!(table_count(&pool, "cell_counts").await, 0);
}

#[tokio::test]
async fn test_non_numeric_count_fails() {
    let dir = TempDir::new().unwrap();
    let rows = "prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0,lots,200,300,400\n";
    let csv = write_csv(&dir, HEADER, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("row 2"), "error was: {}", msg);
    assert!(msg.contains("b_cell"), "error was: {}", msg);
    assert!(msg.contains("lots"), "error was: {}", msg);
}

#[tokio::test]
async fn test_conflicting_subject_attributes_fail() {
    let dir = TempDir::new().unwrap();
    let rows = "\
prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0,100,200,300,400
prj1,sbj1,melanoma,63,M,miraclib,yes,s2,PBMC,7,110,210,310,410
";
    let csv = write_csv(&dir, HEADER, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("sbj1"), "error was: {}", msg);
    assert!(msg.contains("age"), "error was: {}", msg);
    assert_eq!(table_count(&pool, "subjects").await, 0);
}

#[tokio::test]
async fn test_empty_sample_identifier_fails() {
    let dir = TempDir::new().unwrap();
    let rows = "prj1,sbj1,melanoma,62,M,miraclib,yes,,PBMC,0,100,200,300,400\n";
    let csv = write_csv(&dir, HEADER, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("row 2"), "error was: {}", msg);
    assert!(msg.contains("sample"), "error was: {}", msg);
}

#[tokio::test]
async fn test_no_population_columns_fails() {
    let dir = TempDir::new().unwrap();
    let header = "project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start";
    let rows = "prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0\n";
    let csv = write_csv(&dir, header, rows);
    let pool = setup_store(&dir).await;

    let err = load_csv(&pool, &csv).await.unwrap_err();
    assert!(
        err.to_string().contains("population"),
        "error was: {}",
        err
    );
}

#[tokio::test]
async fn test_extra_columns_ignored() {
    let dir = TempDir::new().unwrap();
    let header = format!("{},notes", HEADER);
    let rows = "prj1,sbj1,melanoma,62,M,miraclib,yes,s1,PBMC,0,100,200,300,400,hello\n";
    let csv = write_csv(&dir, &header, rows);
    let pool = setup_store(&dir).await;

    let summary = load_csv(&pool, &csv).await.unwrap();
    assert_eq!(summary.samples, 1);
    assert_eq!(summary.cell_counts, 4);
}
