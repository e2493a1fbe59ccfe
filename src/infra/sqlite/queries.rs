use anyhow::{Context, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;

use crate::domain::entities::row::{Row, RowSet, Value, DATETIME_FORMAT};
use crate::infra::sqlite::schema::quote_ident;

pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::DateTime(v) => SqlValue::Text(v.format(DATETIME_FORMAT).to_string()),
    }
}

pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) | ValueRef::Blob(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
    }
}

pub fn read_table(conn: &Connection, table: &str) -> Result<RowSet> {
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quote_ident(table)))
        .with_context(|| format!("failed to prepare read of table: {table}"))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = Vec::new();
    let mut query = stmt
        .query([])
        .with_context(|| format!("failed to read table: {table}"))?;
    while let Some(sql_row) = query.next().context("failed to read row")? {
        let mut row = Row::new();
        for (col_idx, column) in columns.iter().enumerate() {
            let value = sql_row
                .get_ref(col_idx)
                .with_context(|| format!("failed to read column: {column}"))?;
            row.set(column, from_value_ref(value));
        }
        rows.push(row);
    }

    Ok(RowSet::new(columns, rows))
}

/// Inserts every row of `rows`; the caller owns the surrounding transaction.
pub fn insert_rows(conn: &Connection, table: &str, rows: &RowSet) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let column_list = rows
        .columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = std::iter::repeat_n("?", rows.columns.len())
        .collect::<Vec<_>>()
        .join(", ");

    let mut insert_row = conn
        .prepare(&format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(table)
        ))
        .with_context(|| format!("failed to prepare insert into table: {table}"))?;

    for (row_idx, row) in rows.rows.iter().enumerate() {
        let values = rows
            .columns
            .iter()
            .map(|column| to_sql_value(RowSet::cell(row, column)));
        insert_row
            .execute(rusqlite::params_from_iter(values))
            .with_context(|| format!("failed to insert row {row_idx} into table: {table}"))?;
    }

    Ok(())
}

pub fn bulk_insert(conn: &mut Connection, table: &str, rows: &RowSet) -> Result<()> {
    let tx = conn
        .transaction()
        .context("failed to start insert transaction")?;
    insert_rows(&tx, table, rows)?;
    tx.commit().context("failed to commit insert transaction")?;
    Ok(())
}

/// Overwrites every non-key column of the row whose key equals `key`.
pub fn update_row(
    conn: &Connection,
    table: &str,
    key_column: &str,
    key: &Value,
    row: &Row,
) -> Result<usize> {
    let values = row.without(key_column);
    if values.is_empty() {
        return Ok(0);
    }

    let set_clause = values
        .columns()
        .enumerate()
        .map(|(idx, column)| format!("{} = ?{}", quote_ident(column), idx + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let key_param = values.len() + 1;

    let mut params: Vec<SqlValue> = values.iter().map(|(_, value)| to_sql_value(value)).collect();
    params.push(to_sql_value(key));

    conn.execute(
        &format!(
            "UPDATE {} SET {set_clause} WHERE {} = ?{key_param}",
            quote_ident(table),
            quote_ident(key_column)
        ),
        rusqlite::params_from_iter(params),
    )
    .with_context(|| format!("failed to update {table} where {key_column} = {key}"))
}

pub fn delete_row(conn: &Connection, table: &str, key_column: &str, key: &Value) -> Result<usize> {
    conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(key_column)
        ),
        [to_sql_value(key)],
    )
    .with_context(|| format!("failed to delete from {table} where {key_column} = {key}"))
}
