use std::path::PathBuf;

use rusqlite::Connection;

use crate::domain::entities::row::{Row, RowSet, Value};
use crate::infra::sqlite::queries::{bulk_insert, delete_row, read_table, update_row};
use crate::infra::sqlite::schema::{
    create_table_from_rows, open_connection, resolve_db_path, table_exists,
};
use crate::usecase::ports::store::{RowStore, StoreError};

pub struct SqliteRowStore {
    pub db_path: PathBuf,
    pub table: String,
    pub key_column: String,
}

impl SqliteRowStore {
    pub fn new(db_path: PathBuf, table: &str, key_column: &str) -> Self {
        Self {
            db_path,
            table: table.to_string(),
            key_column: key_column.to_string(),
        }
    }

    pub fn from_descriptor(
        descriptor: &str,
        table: &str,
        key_column: &str,
    ) -> Result<Self, StoreError> {
        let db_path = resolve_db_path(descriptor)
            .map_err(|err| StoreError::Unavailable(format!("{err:#}")))?;
        Ok(Self::new(db_path, table, key_column))
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        open_connection(&self.db_path).map_err(|err| StoreError::Unavailable(format!("{err:#}")))
    }
}

fn operation(err: anyhow::Error) -> StoreError {
    StoreError::Operation(format!("{err:#}"))
}

impl RowStore for SqliteRowStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn exists(&self) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        table_exists(&conn, &self.table).map_err(|err| StoreError::Unavailable(format!("{err:#}")))
    }

    fn create_from_schema(&self, sample: &RowSet) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        create_table_from_rows(&mut conn, &self.table, sample)
            .map_err(|err| StoreError::Schema(format!("{err:#}")))
    }

    fn read_all(&self) -> Result<RowSet, StoreError> {
        let conn = self.connect()?;
        read_table(&conn, &self.table).map_err(operation)
    }

    fn bulk_insert(&self, rows: &RowSet) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        bulk_insert(&mut conn, &self.table, rows).map_err(operation)
    }

    fn update_by_key(&self, key: &Value, row: &Row) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        update_row(&conn, &self.table, &self.key_column, key, row).map_err(operation)
    }

    fn delete_by_key(&self, key: &Value) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        delete_row(&conn, &self.table, &self.key_column, key).map_err(operation)
    }
}
