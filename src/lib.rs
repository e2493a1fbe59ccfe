//! Keeps a spreadsheet and a database table consistent by diffing their rows
//! on a key column and applying inserts, updates and deletes.

pub mod config;
pub mod domain;
pub mod infra;
pub mod usecase;


pub use domain::compare::RowComparison;
pub use domain::entities::diff::DiffResult;
pub use domain::entities::row::{Row, RowSet, Value};
pub use usecase::services::change_detector::ChangeDetector;
pub use usecase::services::reconciler::{Reconciler, SyncError, SyncOutcome};
