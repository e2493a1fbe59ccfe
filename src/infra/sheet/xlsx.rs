use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};

use crate::domain::compare::parse_datetime;
use crate::domain::entities::row::{Row, RowSet, Value};
use crate::infra::sheet::{header_names, is_blank_row, replace_file};
use crate::usecase::ports::source::{SourceError, TabularSource};

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Serial in the 1900 date system, which is what new workbooks use.
pub fn datetime_to_excel_serial(datetime: &NaiveDateTime) -> Option<f64> {
    let elapsed = *datetime - excel_epoch()?;
    Some(elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY)
}

pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(v) if v.trim().is_empty() => Value::Null,
        Data::String(v) => Value::Text(v.to_string()),
        Data::Float(v) => Value::from_f64(*v),
        Data::Int(v) => Value::Int(*v),
        Data::Bool(v) => Value::Bool(*v),
        Data::DateTime(v) if v.is_duration() => Value::Float(v.as_f64()),
        Data::DateTime(v) => v
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or(Value::Float(v.as_f64())),
        Data::DateTimeIso(v) => parse_datetime(v)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Text(v.to_string())),
        Data::DurationIso(v) => Value::Text(v.to_string()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

/// Reads the first worksheet; its first row is the header.
pub fn read_xlsx(xlsx_path: &Path) -> Result<RowSet> {
    let mut workbook = open_workbook_auto(xlsx_path)
        .with_context(|| format!("failed to open xlsx: {}", xlsx_path.display()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet: {sheet_name}"))?;

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Ok(RowSet::default());
    };
    let columns = header_names(header.iter().map(|cell| cell_to_value(cell).to_string()));

    let rows = sheet_rows
        .map(|cells| cells.iter().map(cell_to_value).collect::<Vec<_>>())
        .filter(|values| !is_blank_row(values))
        .map(|values| {
            columns
                .iter()
                .cloned()
                .zip(values.into_iter().chain(std::iter::repeat(Value::Null)))
                .collect::<Row>()
        })
        .collect();

    Ok(RowSet::new(columns, rows))
}

/// Writes a single-sheet workbook, header first, replacing `xlsx_path`.
pub fn write_xlsx(xlsx_path: &Path, rows: &RowSet) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let datetime_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);

    let sheet_cols = rows
        .columns
        .iter()
        .enumerate()
        .map(|(col_idx, column)| {
            u16::try_from(col_idx)
                .with_context(|| format!("too many columns for a worksheet at: {column}"))
        })
        .collect::<Result<Vec<u16>>>()?;

    for (&sheet_col, column) in sheet_cols.iter().zip(&rows.columns) {
        worksheet
            .write_string(0, sheet_col, column)
            .with_context(|| format!("failed to write header: {column}"))?;
    }

    for (row_idx, row) in rows.rows.iter().enumerate() {
        let sheet_row = u32::try_from(row_idx + 1)
            .with_context(|| format!("too many rows for a worksheet at row {row_idx}"))?;
        for (&sheet_col, column) in sheet_cols.iter().zip(&rows.columns) {
            let written = match RowSet::cell(row, column) {
                Value::Null => continue,
                Value::Text(v) => worksheet.write_string(sheet_row, sheet_col, v),
                Value::Int(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64),
                Value::Float(v) => worksheet.write_number(sheet_row, sheet_col, *v),
                Value::Bool(v) => worksheet.write_boolean(sheet_row, sheet_col, *v),
                Value::DateTime(v) => match datetime_to_excel_serial(v) {
                    Some(serial) => worksheet.write_number_with_format(
                        sheet_row,
                        sheet_col,
                        serial,
                        &datetime_format,
                    ),
                    None => worksheet.write_string(sheet_row, sheet_col, v.to_string()),
                },
            };
            written.with_context(|| format!("failed to write cell {sheet_row}:{column}"))?;
        }
    }

    replace_file(xlsx_path, |tmp| {
        workbook
            .save(tmp)
            .with_context(|| format!("failed to save xlsx: {}", tmp.display()))
    })
}

pub struct XlsxSource {
    path: PathBuf,
}

impl XlsxSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularSource for XlsxSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RowSet, SourceError> {
        if !self.exists() {
            return Err(SourceError::NotFound(self.path.clone()));
        }
        read_xlsx(&self.path).map_err(|err| SourceError::format(&self.path, format!("{err:#}")))
    }

    fn write(&self, rows: &RowSet) -> Result<(), SourceError> {
        let writable = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if !writable {
            return Err(SourceError::format(
                &self.path,
                "only .xlsx workbooks can be written",
            ));
        }
        write_xlsx(&self.path, rows).map_err(|err| SourceError::io(&self.path, format!("{err:#}")))
    }
}
