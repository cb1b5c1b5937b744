//! Common error types for cytoview

use thiserror::Error;

/// Common result type for cytoview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the cytoview crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or inconsistent input data detected during load
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
