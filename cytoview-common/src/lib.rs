//! # Cytoview Common Library
//!
//! Shared code for the cytoview dashboard service including:
//! - Error types
//! - Configuration resolution (CLI/env/TOML/default)
//! - Database initialization and schema
//! - Row models for the normalized trial store

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
