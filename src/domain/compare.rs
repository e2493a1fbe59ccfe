use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::entities::row::{Row, RowSet, Value};

const TEXT_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];
const TEXT_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const FLOAT_EPSILON: f64 = 1e-9;

/// How two rows are compared when deciding whether an update is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowComparison {
    /// Values must match variant and content exactly.
    Exact,
    /// Values are compared after type normalization, which absorbs the
    /// representation changes a database round trip introduces.
    #[default]
    Normalized,
}

impl RowComparison {
    pub fn parse(text: &str) -> Option<RowComparison> {
        match text.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(RowComparison::Exact),
            "normalized" | "normalised" => Some(RowComparison::Normalized),
            _ => None,
        }
    }

    /// Column-by-column comparison by name; a column absent on one side is null.
    pub fn rows_equal(self, left: &Row, right: &Row) -> bool {
        let columns: BTreeSet<&str> = left.columns().chain(right.columns()).collect();
        columns.into_iter().all(|column| {
            self.values_equal(RowSet::cell(left, column), RowSet::cell(right, column))
        })
    }

    pub fn values_equal(self, left: &Value, right: &Value) -> bool {
        match self {
            RowComparison::Exact => left == right,
            RowComparison::Normalized => normalized_equal(left, right),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Normalized {
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

/// Text is only coerced when the other side is typed; two texts compare trimmed.
fn normalized_equal(left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return left.is_null() && right.is_null();
    }
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return a.trim() == b.trim();
    }
    match (normalize(left), normalize(right)) {
        (Normalized::Int(a), Normalized::Int(b)) => a == b,
        (Normalized::Float(a), Normalized::Float(b)) => floats_equal(a, b),
        (Normalized::Int(a), Normalized::Float(b)) | (Normalized::Float(b), Normalized::Int(a)) => {
            floats_equal(a as f64, b)
        }
        (a, b) => a == b,
    }
}

fn normalize(value: &Value) -> Normalized {
    match value {
        Value::Int(v) => Normalized::Int(*v),
        Value::Float(v) => Normalized::Float(*v),
        Value::Bool(v) => Normalized::Int(i64::from(*v)),
        Value::DateTime(v) => Normalized::DateTime(*v),
        Value::Text(text) => coerce_text(text.trim()),
        Value::Null => Normalized::Text(String::new()),
    }
}

fn coerce_text(text: &str) -> Normalized {
    if is_zero_padded(text) {
        return Normalized::Text(text.to_string());
    }
    if let Ok(number) = text.parse::<i64>() {
        return Normalized::Int(number);
    }
    if let Some(datetime) = parse_datetime(text) {
        return Normalized::DateTime(datetime);
    }
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Normalized::Float(number),
        _ => Normalized::Text(text.to_string()),
    }
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    TEXT_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            TEXT_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// `007`, `-01.5`: digits with a leading zero are codes, not numbers.
pub fn is_zero_padded(text: &str) -> bool {
    let digits = text.trim().trim_start_matches(['-', '+']).as_bytes();
    matches!(digits, [b'0', next, ..] if next.is_ascii_digit())
}

fn floats_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= FLOAT_EPSILON
}
