use crate::domain::compare::RowComparison;
use crate::domain::entities::row::{Row, RowKey, RowSet, RowSetError, Value};

/// `key` is the stored row's key value, so the update matches it as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub key: Value,
    pub row: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelete {
    pub key: Value,
}

/// Row-level difference between a source and a target keyed row set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffResult {
    pub to_insert: Vec<Row>,
    pub to_update: Vec<PendingUpdate>,
    pub to_delete: Vec<PendingDelete>,
}

impl DiffResult {
    /// Keys only in `source` are inserts, keys only in `target` are deletes,
    /// and shared keys whose rows differ under `comparison` are full-row updates.
    pub fn compute(
        source: &RowSet,
        target: &RowSet,
        key_column: &str,
        comparison: RowComparison,
    ) -> Result<DiffResult, RowSetError> {
        let source_index = source.index_by(key_column)?;
        let target_index = target.index_by(key_column)?;

        let mut diff = DiffResult::default();
        for row in &source.rows {
            let key_value = RowSet::cell(row, key_column);
            let Some(key) = RowKey::from_value(key_value) else {
                continue;
            };
            match target_index.get(&key) {
                None => diff.to_insert.push(row.clone()),
                Some(existing) if !comparison.rows_equal(row, existing) => {
                    diff.to_update.push(PendingUpdate {
                        key: RowSet::cell(existing, key_column).clone(),
                        row: row.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for row in &target.rows {
            let key_value = RowSet::cell(row, key_column);
            let Some(key) = RowKey::from_value(key_value) else {
                continue;
            };
            if !source_index.contains_key(&key) {
                diff.to_delete.push(PendingDelete {
                    key: key_value.clone(),
                });
            }
        }

        Ok(diff)
    }

    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}
