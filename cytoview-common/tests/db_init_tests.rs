//! Unit tests for database initialization
//!
//! Covers automatic store creation, idempotent initialization, schema
//! constraints, and the read-only serving connection.

use cytoview_common::db::{connect_readonly, init_database};
use std::path::PathBuf;

fn temp_db(name: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/cytoview-test-{}-{}.db", name, std::process::id()))
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let db_path = temp_db("create");
    let _ = std::fs::remove_file(&db_path);

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let db_path = temp_db("existing");
    let _ = std::fs::remove_file(&db_path);

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    drop(pool1);
    drop(pool2);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_idempotent_initialization() {
    let db_path = temp_db("idempotent");
    let _ = std::fs::remove_file(&db_path);

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO projects (id) VALUES ('prj1')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Re-initializing must not disturb existing rows
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows lost on re-initialization");

    pool2.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_all_tables_created() {
    let db_path = temp_db("tables");
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    for table in ["projects", "subjects", "samples", "cell_counts", "load_info"] {
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(exists, 1, "Table '{}' not created", table);
    }

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_foreign_keys_enabled() {
    let db_path = temp_db("fk");
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    let fk_enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fk_enabled, 1, "Foreign keys should be enabled");

    // Orphan insert must be rejected
    let result = sqlx::query(
        "INSERT INTO samples (id, subject_id, sample_type, time_from_treatment_start)
         VALUES ('s1', 'no-such-subject', 'PBMC', 0)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "Orphan sample insert should fail");

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_negative_count_rejected() {
    let db_path = temp_db("negcount");
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    sqlx::query("INSERT INTO projects (id) VALUES ('prj1')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO subjects (id, project_id, condition, age, sex) VALUES ('sbj1', 'prj1', 'melanoma', 60, 'F')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO samples (id, subject_id, sample_type, time_from_treatment_start) VALUES ('s1', 'sbj1', 'PBMC', 0)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        "INSERT INTO cell_counts (guid, sample_id, population, count) VALUES ('g1', 's1', 'b_cell', -5)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "Negative count should violate CHECK constraint");

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_duplicate_sample_population_ignored() {
    let db_path = temp_db("dupcount");
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    sqlx::query("INSERT INTO projects (id) VALUES ('prj1')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO subjects (id, project_id, condition, age, sex) VALUES ('sbj1', 'prj1', 'melanoma', 60, 'F')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO samples (id, subject_id, sample_type, time_from_treatment_start) VALUES ('s1', 'sbj1', 'PBMC', 0)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT OR IGNORE INTO cell_counts (guid, sample_id, population, count) VALUES ('g1', 's1', 'b_cell', 100)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT OR IGNORE INTO cell_counts (guid, sample_id, population, count) VALUES ('g2', 's1', 'b_cell', 999)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (count_rows, value): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), MAX(count) FROM cell_counts WHERE sample_id = 's1' AND population = 'b_cell'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count_rows, 1, "Duplicate (sample, population) should be ignored");
    assert_eq!(value, 100, "First inserted value should win");

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_readonly_connection_rejects_writes() {
    let db_path = temp_db("readonly");
    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();
    pool.close().await;

    let ro_pool = connect_readonly(&db_path)
        .await
        .expect("Should connect in read-only mode");

    let result = sqlx::query("INSERT INTO projects (id) VALUES ('prj1')")
        .execute(&ro_pool)
        .await;
    assert!(result.is_err(), "Write operation should fail in read-only mode");

    ro_pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_readonly_connection_requires_existing_file() {
    let db_path = temp_db("readonly-missing");
    let _ = std::fs::remove_file(&db_path);

    let result = connect_readonly(&db_path).await;
    assert!(result.is_err(), "Connecting to a missing store should fail");
}
