//! Read-only query layer
//!
//! Each function issues one SQL statement against the store and returns typed
//! rows. Unknown filter values yield empty results, never errors.

mod queries;

pub use queries::{
    average_population_count, baseline_breakdown, baseline_samples, condition_summary,
    dataset_summary, filter_options, frequency_table, responder_frequencies, AverageCountFilter,
    BaselineBreakdown, BaselineSampleRow, CohortFilter, ConditionSummaryRow, DatasetSummary,
    FilterOptions, FrequencyFilter, FrequencyRow, ResponderRow,
};
