use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use env_logger::{Env, Target};
use log::{debug, info, LevelFilter};

use excel_sync::config::SyncConfig;
use excel_sync::infra::log_sink::LogSink;
use excel_sync::infra::sheet::open_source;
use excel_sync::infra::sqlite::repo::SqliteRowStore;
use excel_sync::usecase::ports::events::EventSink;
use excel_sync::{ChangeDetector, DiffResult, Reconciler, SyncOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "excel-sync",
    author,
    version,
    about = "Keep a spreadsheet and a database table in sync",
    long_about = r#"
Keeps a spreadsheet (.xlsx or .csv) and a SQLite table consistent by diffing
their rows on a key column.

Settings come from the environment or a .env file (EXCEL_FILE, DB_CONNECTION,
TABLE_NAME, ID_COLUMN, CHECK_INTERVAL, COMPARE_MODE, LOG_LEVEL, LOG_FILE, DEBUG);
flags override them.

EXAMPLES:
  excel-sync push                          # apply spreadsheet changes to the table
  excel-sync pull                          # overwrite the spreadsheet with the table
  excel-sync diff --table staff            # preview a push
  excel-sync watch --interval 10           # push whenever the file changes
    "#
)]
struct Opt {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, global = true, value_hint = ValueHint::FilePath, help = "Env file to load instead of ./.env")]
    env_file: Option<PathBuf>,
    #[arg(long, global = true, value_hint = ValueHint::FilePath, help = "Spreadsheet to sync")]
    excel_file: Option<PathBuf>,
    #[arg(long, global = true, help = "Database connection descriptor")]
    connection: Option<String>,
    #[arg(long, global = true, help = "Database table name")]
    table: Option<String>,
    #[arg(long, global = true, help = "Key column shared by both sides")]
    id_column: Option<String>,
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply spreadsheet changes to the database table
    Push,
    /// Overwrite the spreadsheet with the database table
    Pull,
    /// Show what a push would change without applying it
    Diff,
    /// Poll the spreadsheet and push whenever it changes
    Watch {
        #[arg(long, value_name = "SECS", help = "Seconds between checks")]
        interval: Option<u64>,
    },
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let mut config = SyncConfig::from_env(opt.env_file.as_deref())?;
    if let Some(excel_file) = opt.excel_file {
        config.excel_file = excel_file;
    }
    if let Some(connection) = opt.connection {
        config.connection = connection;
    }
    if let Some(table) = opt.table {
        config.table_name = table;
    }
    if let Some(id_column) = opt.id_column {
        config.id_column = id_column;
    }

    init_logging(&config, opt.verbose)?;
    let mut reconciler = build_reconciler(&config)?;

    match opt.command {
        Commands::Push => {
            let outcome = reconciler.sync_source_to_store()?;
            println!("{}", describe(&outcome));
        }
        Commands::Pull => {
            let outcome = reconciler.sync_store_to_source()?;
            println!("{}", describe(&outcome));
        }
        Commands::Diff => match reconciler.plan()? {
            Some(diff) => print_diff(&diff, &config.id_column),
            None => println!(
                "table {} does not exist; a push would create it",
                config.table_name
            ),
        },
        Commands::Watch { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.check_interval);
            watch(&mut reconciler, interval);
        }
    }

    Ok(())
}

fn init_logging(config: &SyncConfig, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => config.log_level,
        1 => config.log_level.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_env(
        Env::default().default_filter_or(level.as_str().to_ascii_lowercase()),
    );

    if let Some(log_file) = &config.log_file {
        if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("cannot open log file {}", log_file.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn build_reconciler(config: &SyncConfig) -> Result<Reconciler> {
    let sink: Arc<dyn EventSink> = Arc::new(LogSink);
    let source = open_source(&config.excel_file)?;
    let store = SqliteRowStore::from_descriptor(
        &config.connection,
        &config.table_name,
        &config.id_column,
    )?;
    info!(
        "syncing {} <-> {} (table {}, key {})",
        config.excel_file.display(),
        store.db_path.display(),
        config.table_name,
        config.id_column
    );
    let detector = ChangeDetector::new(source, sink.clone());
    Ok(Reconciler::new(
        detector,
        Arc::new(store),
        sink,
        config.comparison,
    ))
}

/// Single-threaded poll loop, so passes never overlap. Runs until the process is stopped.
fn watch(reconciler: &mut Reconciler, interval: Duration) {
    info!(
        "watching {} every {}s",
        reconciler.detector().source().path().display(),
        interval.as_secs()
    );
    loop {
        match reconciler.poll() {
            Ok(Some(outcome)) => println!("{}", describe(&outcome)),
            Ok(None) => debug!("no change"),
            // already reported through the sink; retry on the next tick
            Err(_) => {}
        }
        std::thread::sleep(interval);
    }
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Bootstrapped { rows } => format!("created table with {rows} rows"),
        SyncOutcome::Applied(report) => format!(
            "{} inserted, {} updated, {} deleted, {} failed",
            report.inserted,
            report.updated,
            report.deleted,
            report.failures()
        ),
        SyncOutcome::Unchanged => "already in sync".to_string(),
        SyncOutcome::Written { rows } => format!("wrote {rows} rows to the spreadsheet"),
    }
}

fn print_diff(diff: &DiffResult, id_column: &str) {
    if diff.is_empty() {
        println!("already in sync");
        return;
    }
    println!(
        "{} to insert, {} to update, {} to delete",
        diff.to_insert.len(),
        diff.to_update.len(),
        diff.to_delete.len()
    );
    for row in &diff.to_insert {
        let key = row.get(id_column).map(ToString::to_string).unwrap_or_default();
        println!("  + {key}");
    }
    for update in &diff.to_update {
        println!("  ~ {}", update.key);
    }
    for delete in &diff.to_delete {
        println!("  - {}", delete.key);
    }
}
