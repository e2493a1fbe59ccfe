use std::collections::HashMap;

use chrono::NaiveDateTime;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell value as read from either side of a sync.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Collapses integral floats to `Int`, the way spreadsheet numbers are stored.
    pub fn from_f64(value: f64) -> Value {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Value::Int(value as i64)
        } else {
            Value::Float(value)
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

/// Canonical text of a key value. `7`, `7.0` and `" 7 "` all map to `"7"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(pub String);

impl RowKey {
    pub fn from_value(value: &Value) -> Option<RowKey> {
        if value.is_null() {
            return None;
        }
        let text = match value {
            Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                (*v as i64).to_string()
            }
            Value::Text(v) => v.trim().to_string(),
            other => other.to_string(),
        };
        Some(RowKey(text))
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered column-name to value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn set(&mut self, column: &str, value: Value) {
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn without(&self, column: &str) -> Row {
        Row {
            cells: self
                .cells
                .iter()
                .filter(|(name, _)| name != column)
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(&column, value);
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSetError {
    MissingKeyColumn { column: String },
    NullKey { column: String, row_idx: usize },
    DuplicateKey { column: String, key: String },
}

impl std::fmt::Display for RowSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowSetError::MissingKeyColumn { column } => {
                write!(f, "key column `{column}` is not part of the schema")
            }
            RowSetError::NullKey { column, row_idx } => {
                write!(f, "row {row_idx} has no value in key column `{column}`")
            }
            RowSetError::DuplicateKey { column, key } => {
                write!(f, "key `{key}` appears more than once in column `{column}`")
            }
        }
    }
}

impl std::error::Error for RowSetError {}

/// Rows sharing one column schema. Column order is kept for display only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    /// Value of `column` in `row`, `Null` when the row lacks the column.
    pub fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        row.get(column).unwrap_or(&NULL)
    }

    /// Indexes rows by the key column, failing on missing, null or repeated keys.
    pub fn index_by(&self, key_column: &str) -> Result<HashMap<RowKey, &Row>, RowSetError> {
        if !self.has_column(key_column) {
            return Err(RowSetError::MissingKeyColumn {
                column: key_column.to_string(),
            });
        }

        let mut index = HashMap::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let key = RowKey::from_value(Self::cell(row, key_column)).ok_or_else(|| {
                RowSetError::NullKey {
                    column: key_column.to_string(),
                    row_idx,
                }
            })?;
            if index.contains_key(&key) {
                return Err(RowSetError::DuplicateKey {
                    column: key_column.to_string(),
                    key: key.0,
                });
            }
            index.insert(key, row);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RowSet {
        RowSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                Row::new().with("id", 1_i64).with("name", "Alice"),
                Row::new().with("id", 2_i64).with("name", "Bob"),
            ],
        )
    }

    #[test]
    fn integral_float_and_int_share_a_key() {
        assert_eq!(
            RowKey::from_value(&Value::Float(7.0)),
            RowKey::from_value(&Value::Int(7))
        );
        assert_eq!(
            RowKey::from_value(&Value::Text(" 7 ".to_string())),
            Some(RowKey("7".to_string()))
        );
        assert_eq!(RowKey::from_value(&Value::Text("  ".to_string())), None);
    }

    #[test]
    fn index_by_rejects_duplicate_keys() {
        let mut set = people();
        set.rows.push(Row::new().with("id", 2.0).with("name", "Bobby"));

        let err = set.index_by("id").expect_err("duplicate key should fail");

        assert_eq!(
            err,
            RowSetError::DuplicateKey {
                column: "id".to_string(),
                key: "2".to_string()
            }
        );
    }

    #[test]
    fn index_by_rejects_missing_column_and_null_key() {
        let set = people();
        assert!(matches!(
            set.index_by("employee_id"),
            Err(RowSetError::MissingKeyColumn { .. })
        ));

        let mut set = people();
        set.rows.push(Row::new().with("name", "Nobody"));
        assert_eq!(
            set.index_by("id").expect_err("null key should fail"),
            RowSetError::NullKey {
                column: "id".to_string(),
                row_idx: 2
            }
        );
    }

    #[test]
    fn row_set_replaces_existing_column() {
        let mut row = Row::new().with("a", 1_i64).with("b", "x");
        row.set("a", Value::Int(5));

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&Value::Int(5)));
        assert_eq!(row.without("a").columns().collect::<Vec<_>>(), vec!["b"]);
    }
}
