//! Connection-related data models.
//!
//! This module defines the supported store backends and connection URL helpers.

use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Local stores and tests
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }

    /// SQL expression yielding the calendar month (1-12) of a timestamp column.
    pub fn month_expr(&self, column: &str) -> String {
        match self {
            Self::PostgreSQL => format!("CAST(EXTRACT(MONTH FROM {column}) AS INTEGER)"),
            Self::SQLite => format!("CAST(strftime('%m', {column}) AS INTEGER)"),
        }
    }

    /// Query returning the server version string.
    pub fn version_query(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "SELECT version()",
            Self::SQLite => "SELECT sqlite_version()",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Get a display-safe version of a connection string (credentials masked).
pub fn masked_connection_string(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@') {
        if let Some(colon_pos) = connection_string[..at_pos].rfind(':') {
            // "postgres://" itself contains a colon; only mask a user:password pair
            if !connection_string[colon_pos + 1..at_pos].starts_with("//") {
                let prefix = &connection_string[..colon_pos + 1];
                let suffix = &connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
    }
    connection_string.to_string()
}
