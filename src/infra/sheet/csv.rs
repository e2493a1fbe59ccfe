use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::compare::is_zero_padded;
use crate::domain::entities::row::{Row, RowSet, Value};
use crate::infra::sheet::{header_names, is_blank_row, replace_file};
use crate::usecase::ports::source::{SourceError, TabularSource};

pub fn parse_field(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if is_zero_padded(trimmed) {
        return Value::Text(field.to_string());
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::Text(field.to_string()),
    }
}

pub fn read_csv(csv_path: &Path) -> Result<RowSet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("failed to open csv: {}", csv_path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers from csv: {}", csv_path.display()))?
        .clone();

    if headers.is_empty() {
        return Ok(RowSet::default());
    }
    let columns = header_names(headers.iter().map(String::from));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to parse csv record")?;
        let values: Vec<Value> = record.iter().map(parse_field).collect();
        if is_blank_row(&values) {
            continue;
        }
        let row = columns
            .iter()
            .cloned()
            .zip(values.into_iter().chain(std::iter::repeat(Value::Null)))
            .collect::<Row>();
        rows.push(row);
    }

    Ok(RowSet::new(columns, rows))
}

pub fn write_csv(csv_path: &Path, rows: &RowSet) -> Result<()> {
    replace_file(csv_path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)
            .with_context(|| format!("failed to create csv: {}", tmp.display()))?;
        writer
            .write_record(&rows.columns)
            .context("failed to write csv header")?;
        for row in &rows.rows {
            writer
                .write_record(
                    rows.columns
                        .iter()
                        .map(|column| RowSet::cell(row, column).to_string()),
                )
                .context("failed to write csv record")?;
        }
        writer.flush().context("failed to flush csv")?;
        Ok(())
    })
}

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularSource for CsvSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RowSet, SourceError> {
        if !self.exists() {
            return Err(SourceError::NotFound(self.path.clone()));
        }
        read_csv(&self.path).map_err(|err| SourceError::format(&self.path, format!("{err:#}")))
    }

    fn write(&self, rows: &RowSet) -> Result<(), SourceError> {
        write_csv(&self.path, rows).map_err(|err| SourceError::io(&self.path, format!("{err:#}")))
    }
}
