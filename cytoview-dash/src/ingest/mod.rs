//! CSV loader
//!
//! Parses the wide-format clinical-trial CSV (one row per sample, one column
//! per cell population), deduplicates project/subject/sample records, unpivots
//! the population columns into (sample, population, count) rows, and inserts
//! everything inside a single transaction.
//!
//! Validation fails fast with the row number and column name; a failed load
//! rolls back and leaves no partial rows. Inserts use OR IGNORE against the
//! natural keys, so re-running against an already-populated store is a no-op.

use chrono::Utc;
use csv::StringRecord;
use cytoview_common::db::models::{CellCount, Sample, Subject, CELL_POPULATIONS};
use cytoview_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

/// Metadata columns the CSV must contain, in addition to at least one known
/// population column
const REQUIRED_COLUMNS: [&str; 10] = [
    "project",
    "subject",
    "condition",
    "age",
    "sex",
    "treatment",
    "response",
    "sample",
    "sample_type",
    "time_from_treatment_start",
];

/// Row counts inserted by a load
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub projects: usize,
    pub subjects: usize,
    pub samples: usize,
    pub cell_counts: usize,
}

/// Load the CSV into the store
///
/// The pool must be read-write (schema already created). Returns the number
/// of distinct records of each kind found in the file.
pub async fn load_csv(pool: &SqlitePool, csv_path: &Path) -> Result<LoadSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let headers = rdr.headers()?.clone();
    let header_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !header_map.contains_key(**c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(Error::Ingest(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    // Population columns are whichever known populations the header carries
    let populations: Vec<(&str, usize)> = CELL_POPULATIONS
        .iter()
        .filter_map(|p| header_map.get(p).map(|&i| (*p, i)))
        .collect();
    if populations.is_empty() {
        return Err(Error::Ingest(format!(
            "no known cell population columns found (expected one or more of: {})",
            CELL_POPULATIONS.join(", ")
        )));
    }

    let mut projects: BTreeSet<String> = BTreeSet::new();
    let mut subjects: BTreeMap<String, Subject> = BTreeMap::new();
    let mut samples: BTreeMap<String, Sample> = BTreeMap::new();
    let mut cell_counts: BTreeMap<(String, String), i64> = BTreeMap::new();

    for (row_idx, result) in rdr.records().enumerate() {
        let row_num = row_idx + 2; // +2 for 1-indexed and header row
        let record = result
            .map_err(|e| Error::Ingest(format!("row {}: CSV parse error: {}", row_num, e)))?;

        let project = require_field(&record, &header_map, "project", row_num)?;
        let subject = require_field(&record, &header_map, "subject", row_num)?;
        let sample = require_field(&record, &header_map, "sample", row_num)?;

        let age = parse_int(field(&record, &header_map, "age"), "age", row_num)?;
        let time = parse_int(
            field(&record, &header_map, "time_from_treatment_start"),
            "time_from_treatment_start",
            row_num,
        )?;

        // Blank treatment/response cells load as NULL
        let treatment = optional(field(&record, &header_map, "treatment"));
        let response = optional(field(&record, &header_map, "response"));

        projects.insert(project.to_string());

        let subject_rec = Subject {
            id: subject.to_string(),
            project_id: project.to_string(),
            condition: field(&record, &header_map, "condition").to_string(),
            age,
            sex: field(&record, &header_map, "sex").to_string(),
            treatment,
            response,
        };
        if let Some(existing) = subjects.get(subject) {
            if let Some(differs) = subject_conflict(existing, &subject_rec) {
                return Err(Error::Ingest(format!(
                    "row {}: subject '{}' appears with conflicting '{}' values",
                    row_num, subject, differs
                )));
            }
        } else {
            subjects.insert(subject.to_string(), subject_rec);
        }

        let sample_rec = Sample {
            id: sample.to_string(),
            subject_id: subject.to_string(),
            sample_type: field(&record, &header_map, "sample_type").to_string(),
            time_from_treatment_start: time,
        };
        if let Some(existing) = samples.get(sample) {
            if let Some(differs) = sample_conflict(existing, &sample_rec) {
                return Err(Error::Ingest(format!(
                    "row {}: sample '{}' appears with conflicting '{}' values",
                    row_num, sample, differs
                )));
            }
        } else {
            samples.insert(sample.to_string(), sample_rec);
        }

        for (population, idx) in &populations {
            let raw = record.get(*idx).unwrap_or("");
            let count = parse_int(raw, population, row_num)?;
            if count < 0 {
                return Err(Error::Ingest(format!(
                    "row {}: column '{}': negative count {}",
                    row_num, population, count
                )));
            }
            let key = (sample.to_string(), population.to_string());
            if let Some(existing) = cell_counts.get(&key) {
                if *existing != count {
                    return Err(Error::Ingest(format!(
                        "row {}: sample '{}' column '{}' has conflicting counts ({} vs {})",
                        row_num, sample, population, existing, count
                    )));
                }
            } else {
                cell_counts.insert(key, count);
            }
        }
    }

    let summary = LoadSummary {
        projects: projects.len(),
        subjects: subjects.len(),
        samples: samples.len(),
        cell_counts: cell_counts.len(),
    };

    // Single transaction: parents first, so foreign keys hold throughout
    let mut tx = pool.begin().await?;

    for id in &projects {
        sqlx::query("INSERT OR IGNORE INTO projects (id) VALUES (?)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    for (id, s) in &subjects {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO subjects (id, project_id, condition, age, sex, treatment, response)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&s.project_id)
        .bind(&s.condition)
        .bind(s.age)
        .bind(&s.sex)
        .bind(&s.treatment)
        .bind(&s.response)
        .execute(&mut *tx)
        .await?;
    }

    for (id, s) in &samples {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO samples (id, subject_id, sample_type, time_from_treatment_start)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&s.subject_id)
        .bind(&s.sample_type)
        .bind(s.time_from_treatment_start)
        .execute(&mut *tx)
        .await?;
    }

    for ((sample_id, population), count) in &cell_counts {
        let row = CellCount::new(sample_id.clone(), population.clone(), *count);
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO cell_counts (guid, sample_id, population, count)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(row.guid.to_string())
        .bind(&row.sample_id)
        .bind(&row.population)
        .bind(row.count)
        .execute(&mut *tx)
        .await?;
    }

    let provenance = [
        ("source_csv", csv_path.display().to_string()),
        ("loaded_at", Utc::now().to_rfc3339()),
        ("projects", summary.projects.to_string()),
        ("subjects", summary.subjects.to_string()),
        ("samples", summary.samples.to_string()),
        ("cell_counts", summary.cell_counts.to_string()),
    ];
    for (key, value) in &provenance {
        sqlx::query("INSERT OR REPLACE INTO load_info (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(
        "Loaded {}: {} projects, {} subjects, {} samples, {} cell counts",
        csv_path.display(),
        summary.projects,
        summary.subjects,
        summary.samples,
        summary.cell_counts
    );

    Ok(summary)
}

fn field<'a>(record: &'a StringRecord, header_map: &HashMap<&str, usize>, name: &str) -> &'a str {
    record.get(header_map[name]).unwrap_or("")
}

fn require_field<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<&str, usize>,
    name: &str,
    row_num: usize,
) -> Result<&'a str> {
    let value = record.get(header_map[name]).unwrap_or("");
    if value.is_empty() {
        return Err(Error::Ingest(format!(
            "row {}: empty '{}' identifier",
            row_num, name
        )));
    }
    Ok(value)
}

fn parse_int(raw: &str, column: &str, row_num: usize) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| {
        Error::Ingest(format!(
            "row {}: column '{}': invalid integer '{}'",
            row_num, column, raw
        ))
    })
}

fn optional(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn subject_conflict(a: &Subject, b: &Subject) -> Option<&'static str> {
    if a.project_id != b.project_id {
        Some("project")
    } else if a.condition != b.condition {
        Some("condition")
    } else if a.age != b.age {
        Some("age")
    } else if a.sex != b.sex {
        Some("sex")
    } else if a.treatment != b.treatment {
        Some("treatment")
    } else if a.response != b.response {
        Some("response")
    } else {
        None
    }
}

fn sample_conflict(a: &Sample, b: &Sample) -> Option<&'static str> {
    if a.subject_id != b.subject_id {
        Some("subject")
    } else if a.sample_type != b.sample_type {
        Some("sample_type")
    } else if a.time_from_treatment_start != b.time_from_treatment_start {
        Some("time_from_treatment_start")
    } else {
        None
    }
}
