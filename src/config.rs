use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::LevelFilter;

use crate::domain::compare::RowComparison;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbType {
    Sqlite,
    Mysql,
    Postgresql,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub excel_file: PathBuf,
    pub db_type: DbType,
    pub connection: String,
    pub table_name: String,
    pub id_column: String,
    pub check_interval: Duration,
    pub comparison: RowComparison,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub debug: bool,
}

impl SyncConfig {
    /// Loads `env_file` (or `.env` when present) and reads the process environment.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .with_context(|| format!("failed to load env file: {}", path.display()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let db_type = match var("DB_TYPE", "sqlite").to_ascii_lowercase().as_str() {
            "sqlite" => DbType::Sqlite,
            "mysql" => DbType::Mysql,
            "postgresql" | "postgres" => DbType::Postgresql,
            other => anyhow::bail!("unknown DB_TYPE `{other}`"),
        };

        let host = var("DB_HOST", "127.0.0.1");
        let user = var("DB_USER", "root");
        let password = lookup("DB_PASSWORD").unwrap_or_default();
        let name = var("DB_NAME", "excel");
        let charset = var("DB_CHARSET", "utf8");
        let connection = match db_type {
            DbType::Sqlite => var("DB_CONNECTION", "sqlite:///database.db"),
            DbType::Mysql => {
                format!("mysql://{user}:{password}@{host}/{name}?charset={charset}")
            }
            DbType::Postgresql => format!("postgresql://{user}:{password}@{host}/{name}"),
        };

        let check_interval = var("CHECK_INTERVAL", "30")
            .trim()
            .parse::<u64>()
            .context("CHECK_INTERVAL must be a whole number of seconds")?;

        let compare_mode = var("COMPARE_MODE", "normalized");
        let comparison = RowComparison::parse(&compare_mode)
            .with_context(|| format!("unknown COMPARE_MODE `{compare_mode}`"))?;

        let debug = matches!(
            var("DEBUG", "False").to_ascii_lowercase().as_str(),
            "true" | "1" | "t"
        );
        let log_level = if debug {
            LevelFilter::Debug
        } else {
            parse_level(&var("LOG_LEVEL", "INFO"))?
        };

        Ok(Self {
            excel_file: PathBuf::from(var("EXCEL_FILE", "data.xlsx")),
            db_type,
            connection,
            table_name: var("TABLE_NAME", "employees"),
            id_column: var("ID_COLUMN", "employee_id"),
            check_interval: Duration::from_secs(check_interval),
            comparison,
            log_level,
            log_file: lookup("LOG_FILE")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            debug,
        })
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => Ok(LevelFilter::Error),
        "WARNING" => Ok(LevelFilter::Warn),
        other => other
            .parse::<LevelFilter>()
            .with_context(|| format!("unknown LOG_LEVEL `{level}`")),
    }
}
