use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::entities::row::Value;
use crate::usecase::ports::source::{SourceError, TabularSource};

pub mod csv;
pub mod xlsx;

/// Picks the tabular source implementation from the file extension.
pub fn open_source(path: &Path) -> Result<Arc<dyn TabularSource>, SourceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(Arc::new(csv::CsvSource::new(path))),
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Ok(Arc::new(xlsx::XlsxSource::new(path))),
        _ => Err(SourceError::format(
            path,
            "unsupported file type, expected .xlsx or .csv",
        )),
    }
}

/// Cleans raw header cells: blanks become `Unnamed: <idx>` and repeats get `.1`, `.2`, ...
pub fn header_names(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.enumerate()
        .map(|(idx, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                name.to_string()
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

pub fn is_blank_row(values: &[Value]) -> bool {
    values.iter().all(Value::is_null)
}

/// Writes through a sibling temp file and renames it over `path`.
pub fn replace_file(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp-sync");
    if let Err(err) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("cannot atomically replace {}", path.display()))
}
