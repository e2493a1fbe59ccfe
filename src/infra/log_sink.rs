use log::{debug, error, info, warn};

use crate::domain::entities::report::RowOp;
use crate::usecase::ports::events::{EventSink, SyncEvent};

/// Forwards sync events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &SyncEvent<'_>) {
        match event {
            SyncEvent::PassStarted { direction } => info!("{direction} sync started"),
            SyncEvent::PassFinished { direction, report } => {
                info!(
                    "{direction} sync finished in {:.2}s: {} inserted, {} updated, {} deleted",
                    report.elapsed.as_secs_f64(),
                    report.inserted,
                    report.updated,
                    report.deleted
                );
                if report.failures() > 0 {
                    warn!(
                        "{direction} sync had {} failed updates and {} failed deletes",
                        report.failed_updates, report.failed_deletes
                    );
                }
            }
            SyncEvent::PassSkipped { direction, reason } => {
                info!("{direction} sync skipped: {reason}")
            }
            SyncEvent::PassFailed { direction, message } => {
                error!("{direction} sync failed: {message}")
            }
            SyncEvent::TableCreated { table, rows } => {
                info!("created table {table} with {rows} rows")
            }
            SyncEvent::RowsInserted { table, rows } => info!("inserted {rows} rows into {table}"),
            SyncEvent::RowFailed {
                table,
                op,
                key,
                message,
            } => warn!("{op} failed: table={table} key={key}: {message}"),
            SyncEvent::RowMissing {
                table,
                op: RowOp::Update,
                key,
            } => warn!("update matched no rows: table={table} key={key}"),
            SyncEvent::RowMissing { table, op, key } => {
                debug!("{op} matched no rows: table={table} key={key}")
            }
            SyncEvent::ChangeDetected { path } => info!("file change detected: {}", path.display()),
            SyncEvent::DetectionFailed { path, message } => {
                warn!("change detection failed for {}: {message}", path.display())
            }
            SyncEvent::SourceWritten { path, rows } => {
                info!("wrote {rows} rows to {}", path.display())
            }
        }
    }
}
