//! Error types for the FloatChat MCP server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant carries a message an AI assistant can act on; the dispatcher turns
//! every one of them into a single `{"error": "..."}` payload.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Tool '{name}' is already registered")]
    DuplicateTool { name: String },

    #[error("Query rejected: {reason}")]
    UnsafeQuery { reason: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        /// True when the failure means the connection itself is gone
        fatal_network: bool,
        suggestion: String,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("{message}")]
    Handler { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create a duplicate registration error.
    pub fn duplicate_tool(name: impl Into<String>) -> Self {
        Self::DuplicateTool { name: name.into() }
    }

    /// Create a safety gate rejection.
    pub fn unsafe_query(reason: impl Into<String>) -> Self {
        Self::UnsafeQuery {
            reason: reason.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
            fatal_network: false,
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error for a lost or reset connection.
    pub fn fatal_network(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state: None,
            fatal_network: true,
            suggestion: "The connection pool was rebuilt; retry the call".to_string(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a handler-local error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::Query {
                    fatal_network: true,
                    ..
                }
        )
    }

    /// Check if this error reports a dead connection.
    pub fn is_fatal_network(&self) -> bool {
        matches!(
            self,
            Self::Query {
                fatal_network: true,
                ..
            }
        )
    }

    /// Message shown to the caller inside the `{"error": ...}` envelope.
    pub fn user_message(&self) -> String {
        match self {
            Self::Query {
                message,
                sql_state: Some(code),
                ..
            } => format!("Query failed: {} (SQLSTATE: {})", message, code),
            _ => self.to_string(),
        }
    }
}

/// Convert sqlx errors to ToolError.
impl From<sqlx::Error> for ToolError {
    fn from(err: sqlx::Error) -> Self {
        if crate::db::pool::is_fatal_network_error(&err) {
            return ToolError::fatal_network(err.to_string());
        }
        match err {
            sqlx::Error::Configuration(msg) => ToolError::connection(
                msg.to_string(),
                "Check the DATABASE_URL format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ToolError::query(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced columns",
                )
            }
            sqlx::Error::RowNotFound => ToolError::query(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => ToolError::connection(
                "Timed out waiting for a pooled connection",
                "The database may be overloaded or unreachable; retry the call",
            ),
            sqlx::Error::Io(io_err) => ToolError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => ToolError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration (sslmode in DATABASE_URL)",
            ),
            sqlx::Error::Protocol(msg) => ToolError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => ToolError::query(
                format!("Column not found: {}", col),
                None,
                "Check the column names of profiles and profile_summaries",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                ToolError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                ToolError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => ToolError::internal("Database worker crashed"),
            _ => ToolError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::handler(format!("File export failed: {}", err))
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = ToolError::query("Syntax error", Some("42601".to_string()), "Check SQL syntax");
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(ToolError::invalid_input("x").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(ToolError::timeout("query", 30).is_retryable());
        assert!(ToolError::connection("err", "sugg").is_retryable());
        assert!(ToolError::fatal_network("connection reset").is_retryable());
        assert!(!ToolError::query("syntax", None, "fix it").is_retryable());
        assert!(!ToolError::unsafe_query("not a select").is_retryable());
    }

    #[test]
    fn test_user_message_includes_sql_state() {
        let err = ToolError::query("relation does not exist", Some("42P01".into()), "check");
        assert!(err.user_message().contains("42P01"));
    }

    #[test]
    fn test_handler_error_message_is_verbatim() {
        let err = ToolError::handler("no rows matched the export filter");
        assert_eq!(err.user_message(), "no rows matched the export filter");
    }

    #[test]
    fn test_pool_timeout_maps_to_retryable_connection_error() {
        let err: ToolError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ToolError::Connection { .. }));
        assert!(err.is_retryable());
        assert!(!err.to_string().chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_pool_closed_maps_to_fatal_network() {
        let err: ToolError = sqlx::Error::PoolClosed.into();
        assert!(err.is_fatal_network());
    }

    #[test]
    fn test_io_reset_maps_to_fatal_network() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: ToolError = sqlx::Error::Io(io).into();
        assert!(err.is_fatal_network());
    }
}
