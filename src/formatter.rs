//! Response Formatter
//!
//! Deterministic final layer: classifies the shape of a non-empty result set
//! into a tagged union and renders a unit-aware phrase from the question's own
//! wording. No model call happens here, so the answer stays auditable even
//! though upstream steps used one.

use crate::backend::QueryResult;
use crate::vocabulary::IDENTITY_COLUMNS;
use itertools::Itertools;
use serde_json::Value;

const LISTING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    /// One row, one column.
    Scalar(ScalarValue),
    /// One row, several columns, with an identity column present.
    EntityMetricPair {
        entity: String,
        value: ScalarValue,
    },
    /// Anything else: render as a listing.
    Listing { total: usize },
}

fn scalar_from_json(value: &Value) -> ScalarValue {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(ScalarValue::Number)
            .unwrap_or_else(|| ScalarValue::Text(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(ScalarValue::Number)
            .unwrap_or_else(|_| ScalarValue::Text(s.clone())),
        Value::Null => ScalarValue::Text("NULL".to_string()),
        other => ScalarValue::Text(other.to_string()),
    }
}

/// Classify a non-empty result set into exactly one shape.
pub fn classify_shape(result: &QueryResult) -> Option<ResultShape> {
    if result.rows.is_empty() {
        return None;
    }

    if result.rows.len() == 1 {
        let row = &result.rows[0];
        if result.columns.len() == 1 {
            let value = row
                .get(&result.columns[0])
                .map(scalar_from_json)
                .unwrap_or_else(|| ScalarValue::Text("NULL".to_string()));
            return Some(ResultShape::Scalar(value));
        }

        let entity = IDENTITY_COLUMNS
            .iter()
            .find_map(|c| row.get(*c).and_then(|v| v.as_str()).map(|s| s.to_string()));
        let metric_column = result
            .columns
            .iter()
            .find(|c| !IDENTITY_COLUMNS.contains(&c.as_str()));

        if let (Some(entity), Some(metric_column)) = (entity, metric_column) {
            let value = row
                .get(metric_column)
                .map(scalar_from_json)
                .unwrap_or_else(|| ScalarValue::Text("NULL".to_string()));
            return Some(ResultShape::EntityMetricPair { entity, value });
        }
    }

    Some(ResultShape::Listing {
        total: result.rows.len(),
    })
}

/// Render the final answer for a non-empty result set.
pub fn render(question: &str, result: &QueryResult) -> String {
    let question_lower = question.to_lowercase();

    match classify_shape(result) {
        Some(ResultShape::Scalar(value)) => render_scalar(&question_lower, &value),
        Some(ResultShape::EntityMetricPair { entity, value }) => {
            render_pair(&question_lower, &entity, &value)
        }
        Some(ResultShape::Listing { total }) => render_listing(result, total),
        None => "I couldn't find any data for that question.".to_string(),
    }
}

fn render_scalar(question_lower: &str, value: &ScalarValue) -> String {
    let number = match value {
        ScalarValue::Number(n) => *n,
        ScalarValue::Text(text) => return format!("The result is: {}", text),
    };

    if question_lower.contains("production") || question_lower.contains("count") {
        return format!(
            "The total production count is **{} units**.",
            format_thousands(number, 0)
        );
    }

    if question_lower.contains("downtime") {
        let qualifier = duration_qualifier(question_lower);
        return format!(
            "The {} downtime is **{}**.",
            qualifier,
            format_duration(number)
        );
    }

    if question_lower.contains("cycletime") || question_lower.contains("cycle time") {
        let qualifier = if question_lower.contains("average") || question_lower.contains("avg") {
            "average"
        } else {
            "most recent"
        };
        return format!(
            "The {} cycle time is **{} seconds**.",
            qualifier,
            format_thousands(number, 2)
        );
    }

    format!("The result is **{}**.", format_thousands(number, 2))
}

fn duration_qualifier(question_lower: &str) -> &'static str {
    if question_lower.contains("average") || question_lower.contains("avg") {
        "average"
    } else if question_lower.contains("total") || question_lower.contains("sum") {
        "total"
    } else {
        "most recent"
    }
}

fn render_pair(question_lower: &str, entity: &str, value: &ScalarValue) -> String {
    let number = match value {
        ScalarValue::Number(n) => *n,
        ScalarValue::Text(text) => {
            return format!("Found data for **{}**: {}", entity, text);
        }
    };

    let operation = if question_lower.contains("lowest") {
        "lowest"
    } else {
        "highest"
    };

    if question_lower.contains("downtime") {
        format!(
            "The machine with the {} downtime is **{}** with **{}**.",
            operation,
            entity,
            format_duration(number)
        )
    } else if question_lower.contains("cycletime") || question_lower.contains("cycle time") {
        format!(
            "The machine with the {} cycle time is **{}** with **{} seconds**.",
            operation,
            entity,
            format_thousands(number, 2)
        )
    } else if question_lower.contains("production") {
        format!(
            "The machine with the {} production is **{}** with **{} units**.",
            operation,
            entity,
            format_thousands(number, 0)
        )
    } else {
        format!(
            "Found **{}** with a value of **{}**.",
            entity,
            format_thousands(number, 2)
        )
    }
}

fn render_listing(result: &QueryResult, total: usize) -> String {
    let listed = result
        .rows
        .iter()
        .take(LISTING_LIMIT)
        .enumerate()
        .map(|(idx, row)| {
            let row_str = result
                .columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| format!("{}: {}", c, render_value(v))))
                .join(", ");
            format!("{}. {}", idx + 1, row_str)
        })
        .join("\n");

    format!(
        "Found {} results. Here are the top {}:\n\n{}",
        total,
        LISTING_LIMIT.min(total),
        listed
    )
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Duration phrasing: raw seconds, annotated with the larger unit when the
/// value crosses a minute or an hour.
pub fn format_duration(seconds: f64) -> String {
    if seconds > 3600.0 {
        format!(
            "{} seconds (~{:.1} hours)",
            format_thousands(seconds, 0),
            seconds / 3600.0
        )
    } else if seconds > 60.0 {
        format!(
            "{} seconds (~{:.1} minutes)",
            format_thousands(seconds, 0),
            seconds / 60.0
        )
    } else {
        format!("{} seconds", format_thousands(seconds, 0))
    }
}

/// Fixed-decimal rendering with comma-grouped thousands.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (count, ch) in int_part.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let mut out: String = grouped.chars().rev().collect();

    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn single_value_result(column: &str, value: Value) -> QueryResult {
        let mut row = HashMap::new();
        row.insert(column.to_string(), value);
        QueryResult {
            columns: vec![column.to_string()],
            rows: vec![row],
        }
    }

    #[test]
    fn production_scalar_renders_units() {
        let result = single_value_result("total", Value::from(12345.0));
        let answer = render("what is the total production for line 2?", &result);
        assert!(answer.contains("12,345"), "got: {}", answer);
        assert!(answer.contains("units"), "got: {}", answer);
    }

    #[test]
    fn average_downtime_renders_hours_equivalent() {
        let result = single_value_result("avg_downtime", Value::from(5400.0));
        let answer = render("what is the average downtime for macline?", &result);
        assert!(answer.contains("5,400 seconds"), "got: {}", answer);
        assert!(answer.contains("1.5 hours"), "got: {}", answer);
        assert!(answer.contains("average"), "got: {}", answer);
    }

    #[test]
    fn short_downtime_stays_in_seconds() {
        let result = single_value_result("downtime", Value::from(45.0));
        let answer = render("most recent downtime?", &result);
        assert!(answer.contains("45 seconds"), "got: {}", answer);
        assert!(!answer.contains("minutes"), "got: {}", answer);
    }

    #[test]
    fn minute_range_downtime_gets_minutes_equivalent() {
        let result = single_value_result("downtime", Value::from(90.0));
        let answer = render("total downtime today?", &result);
        assert!(answer.contains("90 seconds"), "got: {}", answer);
        assert!(answer.contains("1.5 minutes"), "got: {}", answer);
    }

    #[test]
    fn cycle_time_renders_two_decimals() {
        let result = single_value_result("cycle", Value::from(12.5));
        let answer = render("average cycle time for galvatron?", &result);
        assert!(answer.contains("12.50 seconds"), "got: {}", answer);
    }

    #[test]
    fn numeric_text_scalar_is_treated_as_number() {
        let result = single_value_result("total", Value::String("12345".to_string()));
        let answer = render("production count?", &result);
        assert!(answer.contains("12,345"), "got: {}", answer);
    }

    #[test]
    fn non_numeric_scalar_falls_back_to_plain_phrase() {
        let result = single_value_result("status", Value::String("RUNNING".to_string()));
        let answer = render("what is the machine status?", &result);
        assert_eq!(answer, "The result is: RUNNING");
    }

    #[test]
    fn entity_metric_pair_names_the_machine() {
        let mut row = HashMap::new();
        row.insert(
            "MACHINE_NAME".to_string(),
            Value::String("GalvatronTrx".to_string()),
        );
        row.insert("max_downtime".to_string(), Value::from(7200.0));
        let result = QueryResult {
            columns: vec!["MACHINE_NAME".to_string(), "max_downtime".to_string()],
            rows: vec![row],
        };

        let answer = render("which machine has the highest downtime?", &result);
        assert!(answer.contains("GalvatronTrx"), "got: {}", answer);
        assert!(answer.contains("highest"), "got: {}", answer);
        assert!(answer.contains("2.0 hours"), "got: {}", answer);
    }

    #[test]
    fn listing_caps_at_five_rows_with_true_total() {
        let rows: Vec<HashMap<String, Value>> = (0..8)
            .map(|i| {
                let mut row = HashMap::new();
                row.insert("MACHINE_NAME".to_string(), Value::String(format!("m{}", i)));
                row
            })
            .collect();
        let result = QueryResult {
            columns: vec!["MACHINE_NAME".to_string()],
            rows,
        };

        let answer = render("list machines", &result);
        assert!(answer.contains("Found 8 results"), "got: {}", answer);
        let listed = answer.lines().filter(|l| l.contains("MACHINE_NAME:")).count();
        assert_eq!(listed, 5, "got: {}", answer);
    }

    #[test]
    fn shape_classification_is_a_tagged_union() {
        let scalar = single_value_result("v", Value::from(1.0));
        assert!(matches!(
            classify_shape(&scalar),
            Some(ResultShape::Scalar(ScalarValue::Number(_)))
        ));

        let empty = QueryResult::default();
        assert!(classify_shape(&empty).is_none());
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(12345.0, 0), "12,345");
        assert_eq!(format_thousands(1234567.89, 2), "1,234,567.89");
        assert_eq!(format_thousands(999.0, 0), "999");
        assert_eq!(format_thousands(-5400.0, 0), "-5,400");
    }
}
