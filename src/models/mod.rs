//! Data models for the FloatChat MCP server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod profile;
pub mod query;

// Re-export commonly used types
pub use connection::{DatabaseType, masked_connection_string};
pub use profile::{BgcVariable, OceanVariable};
pub use query::{
    DEFAULT_ROW_LIMIT, JsonRow, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult, row_f64,
    row_i64,
};
