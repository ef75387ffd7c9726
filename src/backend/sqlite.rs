//! SQLite execution backend
//!
//! Each call opens a scoped connection against the database file and releases
//! it on return. Schema discovery walks `sqlite_master` plus `PRAGMA
//! table_info`, mirroring what the engine feeds into planning prompts.

use crate::backend::{cap_detail, QueryBackend, QueryResult};
use crate::error::{AnalystError, Result};
use crate::vocabulary::IDENTITY_COLUMNS;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path).map_err(AnalystError::from)
    }

    fn table_names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Integer(i) => serde_json::Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
        }
    }
}

impl QueryBackend for SqliteBackend {
    fn describe_schema(&self) -> Result<String> {
        let conn = self.connect()?;
        let mut schema_parts = Vec::new();

        for table in Self::table_names(&conn)? {
            let columns = Self::table_columns(&conn, &table)?;
            if columns.is_empty() {
                continue;
            }
            let column_lines: Vec<String> = columns
                .iter()
                .map(|(name, dtype)| format!("    {} {}", name, dtype.to_uppercase()))
                .collect();
            schema_parts.push(format!(
                "CREATE TABLE {} (\n{}\n);",
                table,
                column_lines.join(",\n")
            ));
        }

        Ok(schema_parts.join("\n\n"))
    }

    fn execute(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.connect()?;
        debug!(sql, "executing against sqlite");

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows_out: Vec<HashMap<String, serde_json::Value>> = Vec::new();
        let mut rows = stmt
            .query([])
            .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?
        {
            let mut row_map = HashMap::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?;
                row_map.insert(name.clone(), Self::value_to_json(value));
            }
            rows_out.push(row_map);
        }

        Ok(QueryResult {
            columns,
            rows: rows_out,
        })
    }

    fn identity_columns(&self) -> Result<Vec<(String, String)>> {
        let conn = self.connect()?;
        let mut found = Vec::new();

        for table in Self::table_names(&conn)? {
            for (column, _) in Self::table_columns(&conn, &table)? {
                if IDENTITY_COLUMNS.contains(&column.as_str()) {
                    found.push((table.clone(), column));
                }
            }
        }

        Ok(found)
    }

    fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{}\" FROM \"{}\" WHERE \"{}\" IS NOT NULL",
            column, table, column
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter(|v| !v.is_empty())
            .collect();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_db() -> SqliteBackend {
        let path = std::env::temp_dir().join(format!("analyst-test-{}.db", uuid::Uuid::new_v4()));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE live_machine_metrics (
                MACHINE_NAME TEXT,
                CYCLE_TIME TEXT,
                CREATED_DATE TEXT
            );
            INSERT INTO live_machine_metrics VALUES
                ('MacLine2A', '12.5', '2025-05-01 10:00:00'),
                ('mac_line_2b', '14.0', '2025-05-01 11:00:00');",
        )
        .unwrap();
        SqliteBackend::new(path)
    }

    #[test]
    fn discovers_schema() {
        let backend = fixture_db();
        let schema = backend.describe_schema().unwrap();
        assert!(schema.contains("CREATE TABLE live_machine_metrics"));
        assert!(schema.contains("MACHINE_NAME TEXT"));
    }

    #[test]
    fn executes_select_and_preserves_columns() {
        let backend = fixture_db();
        let result = backend
            .execute("SELECT MACHINE_NAME, CYCLE_TIME FROM live_machine_metrics ORDER BY MACHINE_NAME")
            .unwrap();
        assert_eq!(result.columns, vec!["MACHINE_NAME", "CYCLE_TIME"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(
            result.rows[0].get("MACHINE_NAME"),
            Some(&serde_json::Value::String("MacLine2A".to_string()))
        );
    }

    #[test]
    fn reports_execution_errors() {
        let backend = fixture_db();
        let err = backend.execute("SELECT nope FROM missing_table").unwrap_err();
        assert!(matches!(err, AnalystError::Execution(_)));
    }

    #[test]
    fn finds_identity_columns_and_values() {
        let backend = fixture_db();
        let identity = backend.identity_columns().unwrap();
        assert_eq!(
            identity,
            vec![("live_machine_metrics".to_string(), "MACHINE_NAME".to_string())]
        );
        let mut values = backend
            .distinct_values("live_machine_metrics", "MACHINE_NAME")
            .unwrap();
        values.sort();
        assert_eq!(values, vec!["MacLine2A", "mac_line_2b"]);
    }
}
