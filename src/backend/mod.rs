//! Query execution backends
//!
//! The engine sees one `QueryBackend` contract; the SQL-database and tabular
//! dataset variants live behind it. Backends are read-only by construction on
//! the engine side: every query reaching `execute` has passed the safety gate.

pub mod dataset;
pub mod sqlite;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use dataset::DatasetBackend;
pub use sqlite::SqliteBackend;

/// Ordered result set: column order preserved, rows as name-to-scalar maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, serde_json::Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Backend error text is internal-log-only and capped so a driver dump
/// cannot flood a log line.
const ERROR_DETAIL_MAX: usize = 300;

pub(crate) fn cap_detail(detail: impl std::fmt::Display) -> String {
    let text = detail.to_string();
    if text.len() <= ERROR_DETAIL_MAX {
        return text;
    }
    let mut end = ERROR_DETAIL_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

pub trait QueryBackend: Send + Sync {
    /// Textual schema enumeration, discovered once at engine startup.
    fn describe_schema(&self) -> Result<String>;

    /// Run one vetted query. Implementations open and release their own
    /// connection per invocation; no pooling at this layer.
    fn execute(&self, sql: &str) -> Result<QueryResult>;

    /// (table, column) pairs for the designated identity columns.
    fn identity_columns(&self) -> Result<Vec<(String, String)>>;

    /// Distinct non-null values of one column, for vocabulary learning.
    fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_detail_is_capped() {
        let long = "x".repeat(1000);
        let capped = cap_detail(&long);
        assert!(capped.ends_with("..."));
        assert!(capped.len() <= ERROR_DETAIL_MAX + 3);
    }

    #[test]
    fn short_error_detail_passes_through() {
        assert_eq!(cap_detail("no such table: ghosts"), "no such table: ghosts");
    }
}
