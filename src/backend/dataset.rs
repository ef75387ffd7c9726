//! Tabular dataset backend
//!
//! CSV files register as lazy tables; SQL runs through the polars SQL context.
//! A fresh context is assembled per `execute` call so no state is held across
//! invocations. This backend also powers the direct aggregation/chart path.

use crate::backend::{cap_detail, QueryBackend, QueryResult};
use crate::error::{AnalystError, Result};
use crate::vocabulary::IDENTITY_COLUMNS;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub struct DatasetBackend {
    tables: HashMap<String, LazyFrame>,
}

impl DatasetBackend {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Register every `*.csv` in `dir` as a table named after the file stem.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut backend = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    AnalystError::Execution(format!("Unreadable file name: {}", path.display()))
                })?
                .to_string();
            let frame = LazyCsvReader::new(&path)
                .with_try_parse_dates(true)
                .with_infer_schema_length(Some(1000))
                .finish()?;
            info!(table = %name, path = %path.display(), "registered dataset table");
            backend.tables.insert(name, frame);
        }
        Ok(backend)
    }

    /// Register an in-memory table.
    pub fn register(&mut self, name: &str, df: DataFrame) {
        self.tables.insert(name.to_string(), df.lazy());
    }

    pub fn frame(&self, table: &str) -> Option<LazyFrame> {
        self.tables.get(table).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn table_schema(&self, table: &str) -> Result<Schema> {
        let frame = self.tables.get(table).ok_or_else(|| {
            AnalystError::Execution(format!("Table not found: {}", table))
        })?;
        let mut frame = frame.clone();
        let schema = frame.schema()?;
        Ok(schema.as_ref().clone())
    }

    fn dataframe_to_result(df: &DataFrame) -> Result<QueryResult> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            let mut row_map = HashMap::new();
            for name in &columns {
                let series = df.column(name)?;
                let value = series.get(row_idx)?;
                row_map.insert(name.clone(), any_value_to_json(value));
            }
            rows.push(row_map);
        }

        Ok(QueryResult { columns, rows })
    }
}

impl Default for DatasetBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn any_value_to_json(value: AnyValue<'_>) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::StringOwned(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int8(v) => serde_json::Value::from(v as i64),
        AnyValue::Int16(v) => serde_json::Value::from(v as i64),
        AnyValue::Int32(v) => serde_json::Value::from(v as i64),
        AnyValue::Int64(v) => serde_json::Value::from(v),
        AnyValue::UInt8(v) => serde_json::Value::from(v as u64),
        AnyValue::UInt16(v) => serde_json::Value::from(v as u64),
        AnyValue::UInt32(v) => serde_json::Value::from(v as u64),
        AnyValue::UInt64(v) => serde_json::Value::from(v),
        AnyValue::Float32(v) => serde_json::Number::from_f64(v as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(other.to_string()),
    }
}

impl QueryBackend for DatasetBackend {
    fn describe_schema(&self) -> Result<String> {
        let mut schema_parts = Vec::new();
        for name in self.table_names() {
            let schema = self.table_schema(&name)?;
            let column_lines: Vec<String> = schema
                .iter()
                .map(|(col, dtype)| format!("    {} {}", col, dtype))
                .collect();
            schema_parts.push(format!(
                "CREATE TABLE {} (\n{}\n);",
                name,
                column_lines.join(",\n")
            ));
        }
        Ok(schema_parts.join("\n\n"))
    }

    fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing against dataset");
        let mut ctx = SQLContext::new();
        for (name, frame) in &self.tables {
            ctx.register(name, frame.clone());
        }
        let df = ctx
            .execute(sql)
            .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?
            .collect()
            .map_err(|e| AnalystError::Execution(format!("SQL error: {}", cap_detail(e))))?;
        Self::dataframe_to_result(&df)
    }

    fn identity_columns(&self) -> Result<Vec<(String, String)>> {
        let mut found = Vec::new();
        for name in self.table_names() {
            let schema = self.table_schema(&name)?;
            for (col, _) in schema.iter() {
                if IDENTITY_COLUMNS.contains(&col.as_str()) {
                    found.push((name.clone(), col.to_string()));
                }
            }
        }
        Ok(found)
    }

    fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let frame = self.tables.get(table).ok_or_else(|| {
            AnalystError::Execution(format!("Table not found: {}", table))
        })?;
        let df = frame
            .clone()
            .select([col(column)])
            .drop_nulls(None)
            .unique(None, UniqueKeepStrategy::First)
            .collect()?;
        let series = df.column(column)?;
        let ca = series
            .str()
            .map_err(|e| AnalystError::Vocabulary(format!("Non-text identity column: {}", e)))?;
        Ok(ca
            .into_iter()
            .flatten()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect())
    }
}
