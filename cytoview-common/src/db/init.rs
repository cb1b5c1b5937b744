//! Database initialization
//!
//! Creates the store file and the normalized trial schema on first run.
//! All CREATE statements are `IF NOT EXISTS`, so initialization is safe to
//! repeat against an existing store.

use crate::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the store and create tables if needed
///
/// Opens (or creates) the SQLite file in read-write mode. Used by the loader
/// at process start; serving uses [`connect_readonly`] instead.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL mode allows concurrent readers during the load transaction
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_projects_table(&pool).await?;
    create_subjects_table(&pool).await?;
    create_samples_table(&pool).await?;
    create_cell_counts_table(&pool).await?;
    create_load_info_table(&pool).await?;

    Ok(pool)
}

/// Connect to an already-loaded store with read-only mode
///
/// Uses SQLite mode=ro so the serving process cannot modify the store.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "database not found: {}",
            db_path.display()
        )));
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePool::connect(&db_url).await?;

    // Verify read-only by attempting a write (should fail)
    #[cfg(debug_assertions)]
    {
        let write_test = sqlx::query("CREATE TABLE _test_write (id INTEGER)")
            .execute(&pool)
            .await;
        if write_test.is_ok() {
            panic!("SAFETY VIOLATION: Database connection is not read-only!");
        }
    }

    Ok(pool)
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subjects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            condition TEXT NOT NULL,
            age INTEGER NOT NULL,
            sex TEXT NOT NULL,
            treatment TEXT,
            response TEXT,
            CHECK (age >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_subjects_project ON subjects(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_subjects_condition ON subjects(condition)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_samples_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL REFERENCES subjects(id),
            sample_type TEXT NOT NULL,
            time_from_treatment_start INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_subject ON samples(subject_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_cell_counts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cell_counts (
            guid TEXT PRIMARY KEY,
            sample_id TEXT NOT NULL REFERENCES samples(id),
            population TEXT NOT NULL,
            count INTEGER NOT NULL,
            CHECK (count >= 0),
            UNIQUE (sample_id, population)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cell_counts_sample ON cell_counts(sample_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cell_counts_population ON cell_counts(population)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the load_info table
///
/// Key-value provenance for the one-time load: source path, timestamp,
/// inserted row counts. Written by the loader, displayed by the dashboard.
async fn create_load_info_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS load_info (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
