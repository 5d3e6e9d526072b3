//! Query execution engine.
//!
//! This module provides query execution functionality with support for:
//! - Parameterized queries
//! - Row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//! - Pool rebuilds after fatal connection errors
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: PostgreSQL-specific query operations
//! - `sqlite`: SQLite-specific query operations
//!
//! Each submodule acquires exactly one pooled connection per statement. The
//! connection guard returns it to the pool when it leaves scope, whatever the
//! outcome.

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::pool::{ConnectionManager, DbPool};
use crate::db::types::RowToJson;
use crate::error::{ToolError, ToolResult};
use crate::models::{
    DEFAULT_ROW_LIMIT, DatabaseType, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult,
};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
    default_timeout: Duration,
    default_limit: u32,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            default_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }

    /// Create a new query executor with custom settings.
    pub fn with_defaults(manager: Arc<ConnectionManager>, query_timeout: Duration, row_limit: u32) -> Self {
        Self {
            manager,
            default_timeout: query_timeout,
            default_limit: row_limit.clamp(1, MAX_ROW_LIMIT),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn db_type(&self) -> DatabaseType {
        self.manager.db_type()
    }

    /// Execute a statement with positional parameters under the default row cap.
    pub async fn execute(&self, sql: &str, params: &[QueryParam]) -> ToolResult<QueryResult> {
        let request = QueryRequest::new(sql).with_params(params.to_vec());
        self.run(&request).await
    }

    /// Execute a query request and return results.
    pub async fn run(&self, request: &QueryRequest) -> ToolResult<QueryResult> {
        let start = Instant::now();
        let row_limit = request.effective_limit(self.default_limit);
        let query_timeout = self.default_timeout;

        let handle = self.manager.get_pool().await;

        debug!(
            sql = %request.sql,
            params = request.params.len(),
            limit = row_limit,
            timeout_secs = query_timeout.as_secs(),
            generation = handle.generation,
            "Executing query"
        );

        let outcome = match &handle.pool {
            DbPool::Postgres(p) => {
                postgres::fetch_rows(p, &request.sql, &request.params, row_limit, query_timeout)
                    .await
                    .map(|rows| process_rows(rows, row_limit, start))
            }
            DbPool::SQLite(p) => {
                sqlite::fetch_rows(p, &request.sql, &request.params, row_limit, query_timeout)
                    .await
                    .map(|rows| process_rows(rows, row_limit, start))
            }
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(FetchError::Timeout) => Err(ToolError::timeout(
                "query execution",
                query_timeout.as_secs(),
            )),
            Err(FetchError::Driver(sqlx::Error::PoolTimedOut)) => Err(ToolError::timeout(
                "connection pool acquire",
                self.manager.settings().connect_timeout.as_secs(),
            )),
            Err(FetchError::Driver(err)) => {
                // Rebuild first so the next caller gets a fresh pool
                self.manager.observe_error(&err, handle.generation).await;
                Err(ToolError::from(err))
            }
        }
    }
}

/// Why a fetch produced no rows.
enum FetchError {
    Driver(sqlx::Error),
    Timeout,
}

/// Process rows from any database type into a QueryResult.
fn process_rows<R: RowToJson>(rows: Vec<R>, row_limit: u32, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    if rows.is_empty() {
        return QueryResult::empty(execution_time_ms);
    }

    let columns = rows[0].column_names();
    let total_rows = rows.len();
    let truncated = total_rows > row_limit as usize;
    let rows_to_take = (row_limit as usize).min(total_rows);

    let json_rows: Vec<_> = rows
        .iter()
        .take(rows_to_take)
        .map(|r| r.to_json_map())
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        row_count: json_rows.len(),
        rows: json_rows,
        truncated,
        execution_time_ms,
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod postgres {
    use super::*;
    use crate::db::params::bind_params;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> Result<Vec<PgRow>, FetchError> {
        let mut conn = pool.acquire().await.map_err(FetchError::Driver)?;

        // When params is empty, use raw SQL to avoid prepared statement issues
        let fetch_limit = row_limit as usize + 1;
        let rows_future = if params.is_empty() {
            use sqlx::Executor;
            let stream = (&mut *conn).fetch(sql);
            stream.take(fetch_limit).collect::<Vec<_>>()
        } else {
            let stream = bind_params(sqlx::query(sql), params).fetch(&mut *conn);
            stream.take(fetch_limit).collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => results.into_iter().collect::<Result<_, _>>().map_err(FetchError::Driver),
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_params;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> Result<Vec<SqliteRow>, FetchError> {
        let mut conn = pool.acquire().await.map_err(FetchError::Driver)?;

        let fetch_limit = row_limit as usize + 1;
        let rows_future = if params.is_empty() {
            use sqlx::Executor;
            let stream = (&mut *conn).fetch(sql);
            stream.take(fetch_limit).collect::<Vec<_>>()
        } else {
            let stream = bind_params(sqlx::query(sql), params).fetch(&mut *conn);
            stream.take(fetch_limit).collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => results.into_iter().collect::<Result<_, _>>().map_err(FetchError::Driver),
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolSettings;
    use serde_json::json;

    async fn memory_executor() -> QueryExecutor {
        let manager = ConnectionManager::connect("sqlite::memory:", PoolSettings::default())
            .await
            .unwrap();
        QueryExecutor::new(Arc::new(manager))
    }

    const COUNT_TO_20: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 20) SELECT x FROM c";

    #[tokio::test]
    async fn test_executor_defaults() {
        let executor = memory_executor().await;
        assert_eq!(
            executor.default_timeout,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)
        );
        assert_eq!(executor.default_limit, DEFAULT_ROW_LIMIT);
    }

    #[tokio::test]
    async fn test_executor_limit_capped() {
        let executor = memory_executor().await;
        let executor = QueryExecutor::with_defaults(
            Arc::clone(executor.manager()),
            Duration::from_secs(5),
            999_999,
        );
        assert_eq!(executor.default_limit, MAX_ROW_LIMIT);
        assert_eq!(executor.default_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_execute_with_params() {
        let executor = memory_executor().await;
        let result = executor
            .execute(
                "SELECT $1 AS name, $2 AS n, $3 AS x",
                &[QueryParam::from("abc"), QueryParam::Int(7), QueryParam::Float(1.5)],
            )
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name", "n", "x"]);
        let row = result.first().unwrap();
        assert_eq!(row["name"], json!("abc"));
        assert_eq!(row["n"], json!(7));
        assert_eq!(row["x"], json!(1.5));
    }

    #[tokio::test]
    async fn test_truncation_detected() {
        let executor = memory_executor().await;
        let result = executor
            .run(&QueryRequest::new(COUNT_TO_20).with_limit(5))
            .await
            .unwrap();
        assert_eq!(result.row_count, 5);
        assert!(result.truncated);

        let result = executor
            .run(&QueryRequest::new(COUNT_TO_20).with_limit(20))
            .await
            .unwrap();
        assert_eq!(result.row_count, 20);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_syntax_error_is_query_error() {
        let executor = memory_executor().await;
        let err = executor.execute("SELEC 1", &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Query { fatal_network: false, .. }));
        assert_eq!(executor.manager().generation().await, 0);
    }

    #[tokio::test]
    async fn test_closed_pool_triggers_rebuild() {
        let executor = memory_executor().await;
        executor.manager().get_pool().await.pool.close().await;

        let err = executor.execute("SELECT 1 AS one", &[]).await.unwrap_err();
        assert!(err.is_fatal_network());
        assert_eq!(executor.manager().generation().await, 1);

        let result = executor.execute("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(result.first().unwrap()["one"], json!(1));
    }

    #[tokio::test]
    async fn test_pool_wait_reports_configured_timeout() {
        let settings = PoolSettings {
            max_connections: 1,
            connect_timeout: Duration::from_secs(1),
            ..PoolSettings::default()
        };
        let manager = ConnectionManager::connect("sqlite::memory:", settings)
            .await
            .unwrap();
        let executor = QueryExecutor::new(Arc::new(manager));

        let DbPool::SQLite(pool) = executor.manager().get_pool().await.pool else {
            panic!("expected SQLite");
        };
        let _held = pool.acquire().await.unwrap();

        let err = executor.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(
            matches!(err, ToolError::Timeout { elapsed_secs: 1, .. }),
            "{err:?}"
        );
        assert_eq!(executor.manager().generation().await, 0);
    }
}
