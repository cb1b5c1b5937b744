//! Database layer: initialization, schema, and row models

pub mod init;
pub mod models;

pub use init::{connect_readonly, init_database};
