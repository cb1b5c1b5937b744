//! Row models for the normalized trial store

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cell population column names expected in the wide-format source CSV
pub const CELL_POPULATIONS: [&str; 5] =
    ["b_cell", "cd8_t_cell", "cd4_t_cell", "nk_cell", "monocyte"];

/// A trial subject, belonging to one project
///
/// `treatment` and `response` are NULL for untreated subjects and subjects
/// whose outcome is unknown; the source CSV leaves those cells blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub project_id: String,
    pub condition: String,
    pub age: i64,
    pub sex: String,
    pub treatment: Option<String>,
    pub response: Option<String>,
}

/// A sample drawn from a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub subject_id: String,
    pub sample_type: String,
    pub time_from_treatment_start: i64,
}

/// One population measurement for a sample
///
/// (sample_id, population) is unique; the guid primary key is generated at
/// load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCount {
    pub guid: Uuid,
    pub sample_id: String,
    pub population: String,
    pub count: i64,
}

impl CellCount {
    pub fn new(sample_id: String, population: String, count: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            sample_id,
            population,
            count,
        }
    }
}
