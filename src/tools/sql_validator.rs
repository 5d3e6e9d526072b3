//! Read-only gate for caller-supplied SQL.
//!
//! Only the free-text `sql_query` tool runs SQL written by the caller. Before
//! it does, the text has to look like a single SELECT:
//!
//! - no statement separator (`;`) and no comment markers (`--`, `/*`),
//!   anywhere in the text, including inside literals
//! - no unquoted data-changing keyword (`INSERT`, `UPDATE`, `DELETE`, `DROP`,
//!   `CREATE`, `ALTER`, `TRUNCATE`, `INTO`)
//! - the first token is `SELECT`
//!
//! Keywords are matched on tokens from [sqlparser]'s tokenizer, so a column
//! called `updated_at` passes while `drop(` or `drop\t` does not. Anything the
//! tokenizer rejects fails the gate.

use crate::error::{ToolError, ToolResult};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Substrings that reject the query outright.
const FORBIDDEN_MARKERS: &[(&str, &str)] = &[
    (";", "multiple statements are not allowed"),
    ("--", "SQL comments are not allowed"),
    ("/*", "SQL comments are not allowed"),
];

/// Words that may change data or schema.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "into",
];

/// Whether `sql` may be executed by the free-text query tool.
pub fn is_safe_select(sql: &str) -> bool {
    check_safe_select(sql).is_ok()
}

/// Like [`is_safe_select`], but reports why the query was rejected.
pub fn check_safe_select(sql: &str) -> ToolResult<()> {
    let normalized = sql.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ToolError::unsafe_query("query is empty"));
    }

    for (marker, reason) in FORBIDDEN_MARKERS {
        if normalized.contains(marker) {
            return Err(ToolError::unsafe_query(*reason));
        }
    }

    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| ToolError::unsafe_query(format!("query could not be tokenized: {}", e)))?;

    let mut significant = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)));

    match significant.next() {
        Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case("select") => {}
        _ => return Err(ToolError::unsafe_query("only SELECT queries are allowed")),
    }

    for token in significant {
        if let Token::Word(w) = token {
            if w.quote_style.is_some() {
                continue;
            }
            let word = w.value.to_lowercase();
            if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
                return Err(ToolError::unsafe_query(format!(
                    "keyword '{}' is not allowed",
                    word.to_uppercase()
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_allowed() {
        assert!(is_safe_select("SELECT * FROM profiles"));
        assert!(is_safe_select("select float_id, time from profile_summaries limit 5"));
        assert!(is_safe_select("   \n\tSELECT 1"));
        assert!(is_safe_select(
            "SELECT float_id, AVG(temperature) FROM profiles GROUP BY float_id"
        ));
    }

    #[test]
    fn test_identifiers_containing_keywords_allowed() {
        assert!(is_safe_select("SELECT updated_at, created, dropped_count FROM t"));
        assert!(is_safe_select("SELECT intolerance FROM t"));
    }

    #[test]
    fn test_keywords_in_literals_and_quoted_identifiers_allowed() {
        assert!(is_safe_select("SELECT * FROM profiles WHERE qc = 'drop'"));
        assert!(is_safe_select("SELECT \"delete\" FROM t"));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(!is_safe_select(""));
        assert!(!is_safe_select("   \n "));
    }

    #[test]
    fn test_separators_and_comments_rejected() {
        assert!(!is_safe_select("SELECT 1; SELECT 2"));
        assert!(!is_safe_select("SELECT 1 -- trailing"));
        assert!(!is_safe_select("SELECT /* hint */ 1"));
        // Markers inside literals still fail closed
        assert!(!is_safe_select("SELECT * FROM t WHERE a = ';'"));
    }

    #[test]
    fn test_writes_rejected() {
        assert!(!is_safe_select("INSERT INTO profiles VALUES (1)"));
        assert!(!is_safe_select("DELETE FROM profiles"));
        assert!(!is_safe_select("UPDATE profiles SET qc = 'x'"));
        assert!(!is_safe_select("DROP TABLE profiles"));
        assert!(!is_safe_select("SELECT * INTO backup FROM profiles"));
        assert!(!is_safe_select("SELECT 1 UNION SELECT 2 FROM t WHERE x IN (SELECT drop(1))"));
        assert!(!is_safe_select("SELECT * FROM t WHERE a = 1 AND\tdelete\t= 2"));
    }

    #[test]
    fn test_non_select_rejected() {
        assert!(!is_safe_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_safe_select("EXPLAIN SELECT 1"));
        assert!(!is_safe_select("\"select\" 1"));
    }

    #[test]
    fn test_untokenizable_rejected() {
        assert!(!is_safe_select("SELECT 'unterminated"));
    }

    #[test]
    fn test_rejection_reason() {
        let err = check_safe_select("SELECT 1; DROP TABLE profiles").unwrap_err();
        assert!(matches!(err, ToolError::UnsafeQuery { .. }));
        assert!(err.to_string().contains("multiple statements"));

        let err = check_safe_select("SELECT * INTO t2 FROM t").unwrap_err();
        assert!(err.to_string().contains("INTO"));
    }
}
