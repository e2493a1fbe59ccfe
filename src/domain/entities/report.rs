use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Spreadsheet to database.
    Push,
    /// Database to spreadsheet.
    Pull,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Push => write!(f, "excel -> db"),
            Direction::Pull => write!(f, "db -> excel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    Update,
    Delete,
}

impl std::fmt::Display for RowOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowOp::Update => write!(f, "update"),
            RowOp::Delete => write!(f, "delete"),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed_updates: usize,
    pub failed_deletes: usize,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn failures(&self) -> usize {
        self.failed_updates + self.failed_deletes
    }
}
