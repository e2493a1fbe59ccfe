use std::sync::Arc;
use std::time::Instant;

use crate::domain::compare::RowComparison;
use crate::domain::entities::diff::DiffResult;
use crate::domain::entities::report::{Direction, RowOp, SyncReport};
use crate::domain::entities::row::{RowSet, RowSetError};
use crate::usecase::ports::events::{EventSink, SyncEvent};
use crate::usecase::ports::source::SourceError;
use crate::usecase::ports::store::{RowStore, StoreError};
use crate::usecase::services::change_detector::ChangeDetector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    Source(SourceError),
    Store(StoreError),
    Precondition(RowSetError),
    /// Pull refused because the store has nothing to write.
    EmptyStore { table: String },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Source(err) => write!(f, "{err}"),
            SyncError::Store(err) => write!(f, "{err}"),
            SyncError::Precondition(err) => write!(f, "{err}"),
            SyncError::EmptyStore { table } => {
                write!(f, "table `{table}` is missing or empty, refusing to overwrite the file")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<SourceError> for SyncError {
    fn from(value: SourceError) -> Self {
        SyncError::Source(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        SyncError::Store(value)
    }
}

impl From<RowSetError> for SyncError {
    fn from(value: RowSetError) -> Self {
        SyncError::Precondition(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Table did not exist and was created from the spreadsheet.
    Bootstrapped { rows: usize },
    /// Diff was applied to the store.
    Applied(SyncReport),
    /// Both sides already agree.
    Unchanged,
    /// Store content replaced the spreadsheet.
    Written { rows: usize },
}

/// Keeps a tabular source and a row store consistent. Pass methods take
/// `&mut self`, so one reconciler never runs two passes at once.
pub struct Reconciler {
    detector: ChangeDetector,
    store: Arc<dyn RowStore>,
    sink: Arc<dyn EventSink>,
    comparison: RowComparison,
}

impl Reconciler {
    pub fn new(
        detector: ChangeDetector,
        store: Arc<dyn RowStore>,
        sink: Arc<dyn EventSink>,
        comparison: RowComparison,
    ) -> Self {
        Self {
            detector,
            store,
            sink,
            comparison,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Pushes only when the spreadsheet changed since the last successful push.
    /// A failed push leaves the change pending, so the next poll retries it.
    pub fn poll(&mut self) -> Result<Option<SyncOutcome>, SyncError> {
        let candidate = match self.detector.pending_change() {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.sink.emit(&SyncEvent::DetectionFailed {
                    path: self.detector.source().path(),
                    message: &err.to_string(),
                });
                return Ok(None);
            }
        };
        let outcome = self.sync_source_to_store()?;
        self.detector.commit(candidate);
        Ok(Some(outcome))
    }

    /// Computes the push diff without applying it. `None` means the table does not exist yet.
    pub fn plan(&self) -> Result<Option<DiffResult>, SyncError> {
        let source = self.detector.source().read()?;
        if !self.store.exists()? {
            return Ok(None);
        }
        let target = self.store.read_all()?;
        let diff = DiffResult::compute(&source, &target, self.store.key_column(), self.comparison)?;
        Ok(Some(diff))
    }

    pub fn sync_source_to_store(&mut self) -> Result<SyncOutcome, SyncError> {
        let direction = Direction::Push;
        self.sink.emit(&SyncEvent::PassStarted { direction });
        let result = self.push();
        self.finish(direction, result)
    }

    pub fn sync_store_to_source(&mut self) -> Result<SyncOutcome, SyncError> {
        let direction = Direction::Pull;
        self.sink.emit(&SyncEvent::PassStarted { direction });
        let result = self.pull();
        self.finish(direction, result)
    }

    fn finish(
        &self,
        direction: Direction,
        result: Result<SyncOutcome, SyncError>,
    ) -> Result<SyncOutcome, SyncError> {
        match &result {
            Ok(SyncOutcome::Applied(report)) => {
                self.sink.emit(&SyncEvent::PassFinished { direction, report });
            }
            Ok(SyncOutcome::Unchanged) => {
                self.sink.emit(&SyncEvent::PassSkipped {
                    direction,
                    reason: "no differences",
                });
            }
            Ok(_) => {}
            Err(err) => {
                self.sink.emit(&SyncEvent::PassFailed {
                    direction,
                    message: &err.to_string(),
                });
            }
        }
        result
    }

    fn push(&self) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let table = self.store.table_name();
        let source = self.detector.source().read()?;

        if !self.store.exists()? {
            source.index_by(self.store.key_column())?;
            self.store.create_from_schema(&source)?;
            self.sink.emit(&SyncEvent::TableCreated {
                table,
                rows: source.len(),
            });
            return Ok(SyncOutcome::Bootstrapped { rows: source.len() });
        }

        let target = self.store.read_all()?;
        let diff = DiffResult::compute(&source, &target, self.store.key_column(), self.comparison)?;
        if diff.is_empty() {
            return Ok(SyncOutcome::Unchanged);
        }

        let mut report = SyncReport::default();

        if !diff.to_insert.is_empty() {
            let inserts = RowSet::new(source.columns.clone(), diff.to_insert);
            self.store.bulk_insert(&inserts)?;
            report.inserted = inserts.len();
            self.sink.emit(&SyncEvent::RowsInserted {
                table,
                rows: report.inserted,
            });
        }

        for update in &diff.to_update {
            match self.store.update_by_key(&update.key, &update.row) {
                // the diff saw this key in the table, so a miss means the update was lost
                Ok(0) => {
                    report.failed_updates += 1;
                    self.sink.emit(&SyncEvent::RowMissing {
                        table,
                        op: RowOp::Update,
                        key: &update.key,
                    });
                }
                Ok(_) => report.updated += 1,
                Err(err) => {
                    report.failed_updates += 1;
                    self.sink.emit(&SyncEvent::RowFailed {
                        table,
                        op: RowOp::Update,
                        key: &update.key,
                        message: &err.to_string(),
                    });
                }
            }
        }

        for delete in &diff.to_delete {
            match self.store.delete_by_key(&delete.key) {
                Ok(0) => self.sink.emit(&SyncEvent::RowMissing {
                    table,
                    op: RowOp::Delete,
                    key: &delete.key,
                }),
                Ok(_) => report.deleted += 1,
                Err(err) => {
                    report.failed_deletes += 1;
                    self.sink.emit(&SyncEvent::RowFailed {
                        table,
                        op: RowOp::Delete,
                        key: &delete.key,
                        message: &err.to_string(),
                    });
                }
            }
        }

        report.elapsed = started.elapsed();
        Ok(SyncOutcome::Applied(report))
    }

    fn pull(&mut self) -> Result<SyncOutcome, SyncError> {
        let table = self.store.table_name().to_string();
        if !self.store.exists()? {
            return Err(SyncError::EmptyStore { table });
        }
        let rows = self.store.read_all()?;
        if rows.is_empty() {
            return Err(SyncError::EmptyStore { table });
        }

        let source = self.detector.source().clone();
        source.write(&rows)?;
        self.detector.refresh()?;
        self.sink.emit(&SyncEvent::SourceWritten {
            path: source.path(),
            rows: rows.len(),
        });
        Ok(SyncOutcome::Written { rows: rows.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use crate::domain::entities::row::{Row, RowKey, Value};
    use crate::usecase::ports::source::TabularSource;

    struct MemorySource {
        path: PathBuf,
        rows: Mutex<RowSet>,
        revision: Mutex<u64>,
    }

    impl MemorySource {
        fn new(rows: RowSet) -> Arc<Self> {
            Arc::new(Self {
                path: PathBuf::from("memory.xlsx"),
                rows: Mutex::new(rows),
                revision: Mutex::new(1),
            })
        }

        fn replace(&self, rows: RowSet) {
            *self.rows.lock().expect("lock") = rows;
            *self.revision.lock().expect("lock") += 1;
        }

        fn rows(&self) -> RowSet {
            self.rows.lock().expect("lock").clone()
        }
    }

    impl TabularSource for MemorySource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> Result<RowSet, SourceError> {
            Ok(self.rows())
        }

        fn write(&self, rows: &RowSet) -> Result<(), SourceError> {
            self.replace(rows.clone());
            Ok(())
        }

        fn exists(&self) -> bool {
            true
        }

        fn modified(&self) -> Result<SystemTime, SourceError> {
            let revision = *self.revision.lock().expect("lock");
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(revision))
        }

        fn content(&self) -> Result<Vec<u8>, SourceError> {
            Ok(format!("{:?}", self.rows()).into_bytes())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        table: Mutex<Option<RowSet>>,
        failing_keys: HashSet<String>,
        vanished_keys: HashSet<String>,
        fail_inserts: bool,
        offline: Mutex<bool>,
        log: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        fn with_rows(rows: RowSet) -> Self {
            Self {
                table: Mutex::new(Some(rows)),
                ..Self::default()
            }
        }

        fn rows(&self) -> RowSet {
            self.table.lock().expect("lock").clone().unwrap_or_default()
        }

        fn ops(&self) -> Vec<String> {
            self.log.lock().expect("lock").clone()
        }

        fn position(rows: &RowSet, key: &Value) -> Option<usize> {
            let key = RowKey::from_value(key)?;
            rows.rows
                .iter()
                .position(|row| RowKey::from_value(RowSet::cell(row, "id")) == Some(key.clone()))
        }

        fn check_key(&self, key: &Value) -> Result<(), StoreError> {
            if self.failing_keys.contains(&key.to_string()) {
                return Err(StoreError::Operation(format!("locked row {key}")));
            }
            Ok(())
        }
    }

    impl RowStore for MemoryStore {
        fn table_name(&self) -> &str {
            "employees"
        }

        fn key_column(&self) -> &str {
            "id"
        }

        fn exists(&self) -> Result<bool, StoreError> {
            if *self.offline.lock().expect("lock") {
                return Err(StoreError::Unavailable("database is locked".to_string()));
            }
            Ok(self.table.lock().expect("lock").is_some())
        }

        fn create_from_schema(&self, sample: &RowSet) -> Result<(), StoreError> {
            self.log.lock().expect("lock").push("create".to_string());
            *self.table.lock().expect("lock") = Some(sample.clone());
            Ok(())
        }

        fn read_all(&self) -> Result<RowSet, StoreError> {
            self.table
                .lock()
                .expect("lock")
                .clone()
                .ok_or_else(|| StoreError::Operation("no such table".to_string()))
        }

        fn bulk_insert(&self, rows: &RowSet) -> Result<(), StoreError> {
            if self.fail_inserts {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.log.lock().expect("lock").push(format!("insert {}", rows.len()));
            let mut table = self.table.lock().expect("lock");
            let table = table.get_or_insert_with(RowSet::default);
            table.rows.extend(rows.rows.iter().cloned());
            Ok(())
        }

        fn update_by_key(&self, key: &Value, row: &Row) -> Result<usize, StoreError> {
            self.check_key(key)?;
            self.log.lock().expect("lock").push(format!("update {key}"));
            if self.vanished_keys.contains(&key.to_string()) {
                return Ok(0);
            }
            let mut table = self.table.lock().expect("lock");
            let table = table.get_or_insert_with(RowSet::default);
            match Self::position(table, key) {
                Some(idx) => {
                    table.rows[idx] = row.clone();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn delete_by_key(&self, key: &Value) -> Result<usize, StoreError> {
            self.check_key(key)?;
            self.log.lock().expect("lock").push(format!("delete {key}"));
            let mut table = self.table.lock().expect("lock");
            let table = table.get_or_insert_with(RowSet::default);
            match Self::position(table, key) {
                Some(idx) => {
                    table.rows.remove(idx);
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        row_failures: Mutex<Vec<(RowOp, String)>>,
        pass_failures: Mutex<Vec<String>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &SyncEvent<'_>) {
            match event {
                SyncEvent::RowFailed { op, key, .. } => self
                    .row_failures
                    .lock()
                    .expect("lock")
                    .push((*op, key.to_string())),
                SyncEvent::PassFailed { message, .. } => self
                    .pass_failures
                    .lock()
                    .expect("lock")
                    .push(message.to_string()),
                _ => {}
            }
        }
    }

    fn people(rows: &[(&str, &str)]) -> RowSet {
        RowSet::new(
            vec!["id".to_string(), "name".to_string()],
            rows.iter()
                .map(|(id, name)| Row::new().with("id", *id).with("name", *name))
                .collect(),
        )
    }

    fn reconciler(
        source: Arc<MemorySource>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
    ) -> Reconciler {
        let detector = ChangeDetector::new(source, sink.clone());
        Reconciler::new(detector, store, sink, RowComparison::Normalized)
    }

    #[test]
    fn bootstrap_creates_table_with_all_source_rows() {
        let source = MemorySource::new(people(&[("A", "1"), ("B", "2"), ("C", "3")]));
        let store = Arc::new(MemoryStore::default());
        let mut reconciler = reconciler(source.clone(), store.clone(), Arc::default());

        let outcome = reconciler.sync_source_to_store().expect("push should succeed");

        assert_eq!(outcome, SyncOutcome::Bootstrapped { rows: 3 });
        assert_eq!(store.rows(), source.rows());
        assert_eq!(store.ops(), vec!["create".to_string()]);
    }

    #[test]
    fn second_push_without_changes_is_a_no_op() {
        let source = MemorySource::new(people(&[("A", "1"), ("B", "2")]));
        let store = Arc::new(MemoryStore::with_rows(people(&[("A", "0"), ("C", "3")])));
        let mut reconciler = reconciler(source, store.clone(), Arc::default());

        let first = reconciler.sync_source_to_store().expect("push should succeed");
        assert!(matches!(first, SyncOutcome::Applied(_)));
        let ops_after_first = store.ops().len();

        let second = reconciler.sync_source_to_store().expect("push should succeed");

        assert_eq!(second, SyncOutcome::Unchanged);
        assert_eq!(store.ops().len(), ops_after_first);
        let plan = reconciler.plan().expect("plan").expect("table exists");
        assert!(plan.is_empty());
    }

    #[test]
    fn push_orders_inserts_then_updates_then_deletes() {
        let source = MemorySource::new(people(&[("A", "x"), ("B", "new")]));
        let store = Arc::new(MemoryStore::with_rows(people(&[("A", "y"), ("C", "old")])));
        let mut reconciler = reconciler(source, store.clone(), Arc::default());

        let outcome = reconciler.sync_source_to_store().expect("push should succeed");

        let SyncOutcome::Applied(report) = outcome else {
            panic!("expected applied outcome, got {outcome:?}");
        };
        assert_eq!((report.inserted, report.updated, report.deleted), (1, 1, 1));
        assert_eq!(
            store.ops(),
            vec![
                "insert 1".to_string(),
                "update A".to_string(),
                "delete C".to_string()
            ]
        );
        let mut names: Vec<String> = store
            .rows()
            .rows
            .iter()
            .map(|row| RowSet::cell(row, "name").to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["new".to_string(), "x".to_string()]);
    }

    #[test]
    fn row_failures_are_reported_and_the_pass_continues() {
        let source = MemorySource::new(people(&[("A", "x"), ("B", "x")]));
        let store = Arc::new(MemoryStore {
            failing_keys: ["A".to_string(), "D".to_string()].into_iter().collect(),
            ..MemoryStore::with_rows(people(&[("A", "y"), ("B", "y"), ("D", "d"), ("E", "e")]))
        });
        let sink = Arc::new(RecordingSink::default());
        let mut reconciler = reconciler(source, store.clone(), sink.clone());

        let outcome = reconciler.sync_source_to_store().expect("row failures are not fatal");

        let SyncOutcome::Applied(report) = outcome else {
            panic!("expected applied outcome, got {outcome:?}");
        };
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures(), 2);
        assert_eq!(
            *sink.row_failures.lock().expect("lock"),
            vec![
                (RowOp::Update, "A".to_string()),
                (RowOp::Delete, "D".to_string())
            ]
        );
    }

    #[test]
    fn failed_bulk_insert_fails_the_pass() {
        let source = MemorySource::new(people(&[("A", "1"), ("B", "2")]));
        let store = Arc::new(MemoryStore {
            fail_inserts: true,
            ..MemoryStore::with_rows(people(&[("A", "1"), ("C", "3")]))
        });
        let sink = Arc::new(RecordingSink::default());
        let mut reconciler = reconciler(source, store.clone(), sink.clone());

        let err = reconciler
            .sync_source_to_store()
            .expect_err("insert failure should abort");

        assert!(matches!(err, SyncError::Store(StoreError::Unavailable(_))));
        assert!(store.ops().is_empty(), "no updates or deletes after a failed insert");
        assert_eq!(sink.pass_failures.lock().expect("lock").len(), 1);
    }

    #[test]
    fn duplicate_source_keys_abort_before_touching_the_store() {
        let source = MemorySource::new(people(&[("A", "1"), ("A", "2")]));
        let store = Arc::new(MemoryStore::with_rows(people(&[("B", "1")])));
        let mut reconciler = reconciler(source, store.clone(), Arc::default());

        let err = reconciler
            .sync_source_to_store()
            .expect_err("duplicate keys should abort");

        assert!(matches!(
            err,
            SyncError::Precondition(RowSetError::DuplicateKey { .. })
        ));
        assert!(store.ops().is_empty());
    }

    #[test]
    fn pull_overwrites_source_and_does_not_retrigger_push() {
        let source = MemorySource::new(people(&[("Z", "stale")]));
        let store = Arc::new(MemoryStore::with_rows(people(&[("A", "1"), ("B", "2")])));
        let mut reconciler = reconciler(source.clone(), store.clone(), Arc::default());

        let outcome = reconciler.sync_store_to_source().expect("pull should succeed");

        assert_eq!(outcome, SyncOutcome::Written { rows: 2 });
        assert_eq!(source.rows(), people(&[("A", "1"), ("B", "2")]));
        assert_eq!(reconciler.poll().expect("poll should succeed"), None);
    }

    #[test]
    fn pull_refuses_an_empty_store() {
        let source = MemorySource::new(people(&[("A", "keep")]));
        let store = Arc::new(MemoryStore::with_rows(people(&[])));
        let mut reconciler = reconciler(source.clone(), store, Arc::default());

        let err = reconciler
            .sync_store_to_source()
            .expect_err("empty store should fail");

        assert!(matches!(err, SyncError::EmptyStore { .. }));
        assert_eq!(source.rows(), people(&[("A", "keep")]));

        let mut reconciler = Reconciler::new(
            ChangeDetector::new(source.clone(), Arc::new(RecordingSink::default())),
            Arc::new(MemoryStore::default()),
            Arc::new(RecordingSink::default()),
            RowComparison::Normalized,
        );
        assert!(matches!(
            reconciler.sync_store_to_source(),
            Err(SyncError::EmptyStore { .. })
        ));
    }

    #[test]
    fn poll_pushes_only_after_a_change() {
        let source = MemorySource::new(people(&[("A", "1")]));
        let store = Arc::new(MemoryStore::default());
        let mut reconciler = reconciler(source.clone(), store.clone(), Arc::default());

        assert_eq!(
            reconciler.poll().expect("poll"),
            Some(SyncOutcome::Bootstrapped { rows: 1 })
        );
        assert_eq!(reconciler.poll().expect("poll"), None);

        source.replace(people(&[("A", "1"), ("B", "2")]));
        let outcome = reconciler.poll().expect("poll").expect("change detected");

        assert!(matches!(outcome, SyncOutcome::Applied(ref r) if r.inserted == 1));
        assert_eq!(store.rows().len(), 2);
    }

    #[test]
    fn poll_retries_a_change_whose_push_failed() {
        let source = MemorySource::new(people(&[("A", "1")]));
        let store = Arc::new(MemoryStore::default());
        *store.offline.lock().expect("lock") = true;
        let sink = Arc::new(RecordingSink::default());
        let mut reconciler = reconciler(source, store.clone(), sink.clone());

        let err = reconciler.poll().expect_err("offline store should fail the pass");
        assert!(matches!(err, SyncError::Store(StoreError::Unavailable(_))));
        assert_eq!(sink.pass_failures.lock().expect("lock").len(), 1);

        *store.offline.lock().expect("lock") = false;

        assert_eq!(
            reconciler.poll().expect("poll"),
            Some(SyncOutcome::Bootstrapped { rows: 1 })
        );
        assert_eq!(reconciler.poll().expect("poll"), None);
    }

    #[test]
    fn update_matching_no_row_counts_as_failed() {
        let source = MemorySource::new(people(&[("A", "x"), ("B", "x")]));
        let store = Arc::new(MemoryStore {
            vanished_keys: ["A".to_string()].into_iter().collect(),
            ..MemoryStore::with_rows(people(&[("A", "y"), ("B", "y")]))
        });
        let mut reconciler = reconciler(source, store, Arc::default());

        let outcome = reconciler.sync_source_to_store().expect("push should succeed");

        let SyncOutcome::Applied(report) = outcome else {
            panic!("expected applied outcome, got {outcome:?}");
        };
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed_updates, 1);
    }
}
