use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::domain::entities::row::{RowSet, Value};
use crate::infra::sqlite::queries::insert_rows;

/// Resolves a connection descriptor to a database file.
///
/// Accepts `sqlite:///relative.db`, `sqlite:////absolute.db` and bare paths.
pub fn resolve_db_path(descriptor: &str) -> Result<PathBuf> {
    let descriptor = descriptor.trim();
    if let Some(rest) = descriptor.strip_prefix("sqlite:///") {
        if rest.is_empty() || rest == ":memory:" {
            anyhow::bail!("in-memory sqlite databases cannot be shared between passes")
        }
        return Ok(PathBuf::from(rest));
    }
    if let Some((scheme, _)) = descriptor.split_once("://") {
        anyhow::bail!("unsupported database backend `{scheme}`; only sqlite is available")
    }
    if descriptor.is_empty() || descriptor == ":memory:" {
        anyhow::bail!("a database file path is required")
    }
    Ok(PathBuf::from(descriptor))
}

pub fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir: {}", parent.display()))?;
    }
    Connection::open(db_path).with_context(|| format!("failed to open db: {}", db_path.display()))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to look up table: {table}"))?;
    Ok(count > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Timestamp,
    Text,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<ColumnKind> {
        match value {
            Value::Null => None,
            Value::Int(_) | Value::Bool(_) => Some(ColumnKind::Integer),
            Value::Float(_) => Some(ColumnKind::Real),
            Value::DateTime(_) => Some(ColumnKind::Timestamp),
            Value::Text(_) => Some(ColumnKind::Text),
        }
    }

    fn merge(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Real) | (ColumnKind::Real, ColumnKind::Integer) => {
                ColumnKind::Real
            }
            _ => ColumnKind::Text,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Timestamp => "TIMESTAMP",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// SQL type for a column, inferred from its non-null sample values.
pub fn infer_column_type(sample: &RowSet, column: &str) -> &'static str {
    sample
        .rows
        .iter()
        .filter_map(|row| ColumnKind::of(RowSet::cell(row, column)))
        .reduce(ColumnKind::merge)
        .unwrap_or(ColumnKind::Text)
        .sql()
}

/// Drops any existing table and recreates it from `sample` in one transaction.
pub fn create_table_from_rows(conn: &mut Connection, table: &str, sample: &RowSet) -> Result<()> {
    if sample.columns.is_empty() {
        anyhow::bail!("cannot create table {table} without columns")
    }

    let column_defs = sample
        .columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(column), infer_column_type(sample, column)))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn
        .transaction()
        .context("failed to start create table transaction")?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])
        .with_context(|| format!("failed to drop table: {table}"))?;
    tx.execute(
        &format!("CREATE TABLE {} ({column_defs})", quote_ident(table)),
        [],
    )
    .with_context(|| format!("failed to create table: {table}"))?;
    insert_rows(&tx, table, sample)?;
    tx.commit()
        .with_context(|| format!("failed to commit create table: {table}"))?;
    Ok(())
}
