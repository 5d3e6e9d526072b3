//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management with in-place rebuilds
//! - Query execution
//! - Row decoding
//! - Parameter binding

pub mod executor;
pub mod params;
pub mod pool;
pub mod types;

pub use crate::models::DatabaseType;
pub use executor::QueryExecutor;
pub use pool::{ConnectionManager, DbPool, PoolHandle, PoolSettings, is_fatal_network_error};
