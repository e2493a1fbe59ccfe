use crate::domain::entities::row::{Row, RowSet, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached or opened.
    Unavailable(String),
    /// Table could not be created from the sample schema.
    Schema(String),
    /// A read or write statement failed.
    Operation(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(message) => write!(f, "store unavailable: {message}"),
            StoreError::Schema(message) => write!(f, "schema error: {message}"),
            StoreError::Operation(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Keyed table over a persistent backend. The table name and key column are
/// fixed when the store is constructed.
pub trait RowStore: Send + Sync {
    fn table_name(&self) -> &str;
    fn key_column(&self) -> &str;

    fn exists(&self) -> Result<bool, StoreError>;
    /// Creates (or replaces) the table with the columns of `sample` and loads its rows.
    fn create_from_schema(&self, sample: &RowSet) -> Result<(), StoreError>;
    fn read_all(&self) -> Result<RowSet, StoreError>;
    /// Appends every row in one operation. Empty input is a no-op.
    fn bulk_insert(&self, rows: &RowSet) -> Result<(), StoreError>;
    /// Overwrites the row matching `key`; returns the number of rows touched.
    fn update_by_key(&self, key: &Value, row: &Row) -> Result<usize, StoreError>;
    /// Deletes the row matching `key`; returns the number of rows removed.
    fn delete_by_key(&self, key: &Value) -> Result<usize, StoreError>;
}
