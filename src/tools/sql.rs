//! Free-text SQL tool.
//!
//! The only tool that executes caller-written SQL. Statements pass the
//! read-only gate in [`sql_validator`] first and run verbatim, with no bound
//! parameters, under a row cap.

use crate::db::QueryExecutor;
use crate::error::ToolResult;
use crate::models::{DEFAULT_ROW_LIMIT, JsonRow, QueryRequest};
use crate::tools::input::clamp_limit;
use crate::tools::registry::FloatTool;
use crate::tools::sql_validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_query_limit() -> u32 {
    1000
}

/// Input for the sql_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SqlQueryInput {
    /// A single SELECT statement over profiles / profile_summaries. No semicolons or comments.
    pub query: String,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default = "default_query_limit")]
    pub limit: u32,
}

/// Output from the sql_query tool.
#[derive(Debug, Clone, Serialize)]
pub struct SqlQueryOutput {
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    /// True if more rows matched than `limit`
    pub truncated: bool,
}

pub struct SqlQueryTool;

impl FloatTool for SqlQueryTool {
    type Input = SqlQueryInput;
    type Output = SqlQueryOutput;

    const NAME: &'static str = "sql_query";
    const TITLE: &'static str = "SQL Query (read-only)";
    const DESCRIPTION: &'static str =
        "Run a read-only SELECT against the profile store. Write statements, multiple statements and comments are rejected.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        sql_validator::check_safe_select(&input.query)?;
        Ok(SqlQueryInput {
            limit: clamp_limit(input.limit, DEFAULT_ROW_LIMIT),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let request = QueryRequest::new(input.query).with_limit(input.limit);
        let result = executor.run(&request).await?;
        debug!(rows = result.row_count, truncated = result.truncated, "sql_query finished");

        Ok(SqlQueryOutput {
            row_count: result.row_count,
            truncated: result.truncated,
            rows: result.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    fn input(query: &str, limit: u32) -> SqlQueryInput {
        SqlQueryInput {
            query: query.to_string(),
            limit,
        }
    }

    #[test]
    fn test_sanitize_rejects_writes() {
        let err = SqlQueryTool
            .sanitize(input("DELETE FROM profiles", 10))
            .unwrap_err();
        assert!(matches!(err, ToolError::UnsafeQuery { .. }));
    }

    #[test]
    fn test_sanitize_clamps_limit() {
        let ok = SqlQueryTool
            .sanitize(input("SELECT * FROM profiles", 50_000))
            .unwrap();
        assert_eq!(ok.limit, DEFAULT_ROW_LIMIT);
        let ok = SqlQueryTool.sanitize(input("SELECT 1", 0)).unwrap();
        assert_eq!(ok.limit, 1);
    }
}
