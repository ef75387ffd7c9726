//! Aggregation and chart artifact path
//!
//! Direct tabular grouping over the dataset backend, bypassing SQL synthesis.
//! A grouping that matches zero rows produces no artifact. Rendering is a
//! collaborator concern behind `ChartRenderer`; the default writer emits the
//! grouped series as a CSV artifact under a stable name, and the returned
//! reference carries a cache-busting marker.

use crate::backend::DatasetBackend;
use crate::error::{AnalystError, Result};
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Sum,
    Avg,
    Count,
    Max,
    Min,
}

impl AggregateFn {
    /// Aggregation implied by the question's wording, if any.
    pub fn from_cues(question: &str) -> Option<Self> {
        let q = question.to_lowercase();
        if q.contains("total") || q.contains("sum") {
            Some(AggregateFn::Sum)
        } else if q.contains("average") || q.contains("avg") {
            Some(AggregateFn::Avg)
        } else if q.contains("how many") || q.contains("count") {
            Some(AggregateFn::Count)
        } else if q.contains("highest") || q.contains("max") {
            Some(AggregateFn::Max)
        } else if q.contains("lowest") || q.contains("min") {
            Some(AggregateFn::Min)
        } else {
            None
        }
    }

    fn expr(&self, metric: &str) -> Expr {
        let metric_expr = col(metric).cast(DataType::Float64);
        match self {
            AggregateFn::Sum => metric_expr.sum().alias("value"),
            AggregateFn::Avg => metric_expr.mean().alias("value"),
            AggregateFn::Count => len().alias("value"),
            AggregateFn::Max => metric_expr.max().alias("value"),
            AggregateFn::Min => metric_expr.min().alias("value"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub table: String,
    pub metric: String,
    pub group_by: String,
    pub agg: AggregateFn,
    /// Lowercased entity tokens; each becomes an independent partial match on
    /// the grouping column, all ANDed.
    pub filter_tokens: Vec<String>,
}

/// Collaborator seam: turns a grouped series into an artifact reference.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, name_base: &str, series: &DataFrame) -> Result<String>;
}

/// Default renderer: writes the grouped series as CSV under a stable name and
/// returns the path with a cache-busting marker.
pub struct CsvChartWriter {
    charts_dir: PathBuf,
}

impl CsvChartWriter {
    pub fn new(charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            charts_dir: charts_dir.into(),
        }
    }
}

impl ChartRenderer for CsvChartWriter {
    fn render(&self, name_base: &str, series: &DataFrame) -> Result<String> {
        std::fs::create_dir_all(&self.charts_dir)?;
        let path = self.charts_dir.join(format!("{}.csv", name_base));

        let mut file = std::fs::File::create(&path)?;
        let mut df = series.clone();
        CsvWriter::new(&mut file).finish(&mut df)?;

        let reference = format!("{}?v={}", path.display(), Uuid::new_v4());
        info!(chart = %reference, "wrote chart artifact");
        Ok(reference)
    }
}

/// Aggregate the requested metric and hand the series to the renderer.
/// Returns `None` when the grouping/filter matches zero rows.
pub fn build_chart(
    backend: &DatasetBackend,
    renderer: &dyn ChartRenderer,
    request: &ChartRequest,
) -> Result<Option<String>> {
    let frame = backend.frame(&request.table).ok_or_else(|| {
        AnalystError::Chart(format!("Unknown chart table: {}", request.table))
    })?;

    let mut lf = frame;
    for token in &request.filter_tokens {
        lf = lf.filter(
            col(&request.group_by)
                .str()
                .to_lowercase()
                .str()
                .contains_literal(lit(token.to_lowercase())),
        );
    }

    let series = lf
        .group_by([col(&request.group_by)])
        .agg([request.agg.expr(&request.metric)])
        .collect()?;

    if series.height() == 0 {
        debug!(table = %request.table, metric = %request.metric, "chart grouping matched no rows");
        return Ok(None);
    }

    let name_base = format!(
        "{}_by_{}",
        sanitize(&request.metric),
        sanitize(&request.group_by)
    );
    renderer.render(&name_base, &series).map(Some)
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
