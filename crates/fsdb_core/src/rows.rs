//! Results of executed requests.

use crate::filter::ID_FIELD;
use fsdb_codec::{RecordId, RecordSet, Value};
use std::collections::btree_map;

/// Outcome of a write request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Records inserted, updated, or deleted.
    pub affected_rows: u64,
    /// ID assigned by an insert.
    pub last_insert_id: Option<RecordId>,
}

impl ExecResult {
    pub(crate) fn affected(count: u64) -> Self {
        Self {
            affected_rows: count,
            last_insert_id: None,
        }
    }

    pub(crate) fn inserted(id: RecordId) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id: Some(id),
        }
    }
}

/// One result row, with values in [`Rows::columns`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RecordId,
    values: Vec<Value>,
}

impl Row {
    /// Returns the record ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the values, ID column first.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the value at a column index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Forward-only cursor over the records a select matched.
///
/// The column list is fixed when the cursor is created: [`ID_FIELD`] first,
/// then every field seen in the matched records, in first-seen order. A
/// record lacking a column yields `Null` for it.
#[derive(Debug)]
pub struct Rows {
    columns: Vec<String>,
    records: btree_map::IntoIter<RecordId, fsdb_codec::Record>,
}

impl Rows {
    pub(crate) fn new(records: RecordSet) -> Self {
        let mut columns = vec![ID_FIELD.to_string()];
        for record in records.values() {
            for field in record.keys() {
                if !columns.contains(field) {
                    columns.push(field.clone());
                }
            }
        }
        Self {
            columns,
            records: records.into_iter(),
        }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let (id, mut record) = self.records.next()?;
        let values = self
            .columns
            .iter()
            .map(|col| {
                if col == ID_FIELD {
                    Value::Text(id.clone())
                } else {
                    record.remove(col).unwrap_or(Value::Null)
                }
            })
            .collect();
        Some(Row { id, values })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for Rows {}
