use std::path::Path;

use crate::domain::entities::report::{Direction, RowOp, SyncReport};
use crate::domain::entities::row::Value;

/// Everything the sync components report while they run.
#[derive(Debug, Clone, Copy)]
pub enum SyncEvent<'a> {
    PassStarted {
        direction: Direction,
    },
    PassFinished {
        direction: Direction,
        report: &'a SyncReport,
    },
    PassSkipped {
        direction: Direction,
        reason: &'a str,
    },
    PassFailed {
        direction: Direction,
        message: &'a str,
    },
    TableCreated {
        table: &'a str,
        rows: usize,
    },
    RowsInserted {
        table: &'a str,
        rows: usize,
    },
    RowFailed {
        table: &'a str,
        op: RowOp,
        key: &'a Value,
        message: &'a str,
    },
    RowMissing {
        table: &'a str,
        op: RowOp,
        key: &'a Value,
    },
    ChangeDetected {
        path: &'a Path,
    },
    DetectionFailed {
        path: &'a Path,
        message: &'a str,
    },
    SourceWritten {
        path: &'a Path,
        rows: usize,
    },
}

/// Structured log channel handed to each component at construction.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent<'_>);
}
