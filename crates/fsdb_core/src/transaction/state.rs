//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::registry::TableRegistry;
use std::collections::BTreeSet;
use tracing::info;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open and collecting dirty tables.
    Open,
    /// Commit was attempted. Terminal, whether or not it succeeded.
    Committed,
    /// Rollback was attempted. Terminal.
    RolledBack,
}

/// An open unit of work on one table registry.
///
/// Tracks the tables dirtied since it began, by name. It does not own the
/// tables: a dirty table that is dropped before commit is simply skipped.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID, unique per registry.
    id: u64,
    /// Current state.
    state: TransactionState,
    /// Names of tables whose persistence was deferred.
    dirty: BTreeSet<String>,
}

impl Transaction {
    /// Creates a new open transaction.
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: TransactionState::Open,
            dirty: BTreeSet::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Records that a table's persistence was deferred.
    ///
    /// Returns true if the table was not yet dirty.
    pub(crate) fn mark_dirty(&mut self, table: &str) -> bool {
        if self.dirty.contains(table) {
            return false;
        }
        self.dirty.insert(table.to_string())
    }

    /// Returns whether a table is dirty in this transaction.
    #[must_use]
    pub fn is_dirty(&self, table: &str) -> bool {
        self.dirty.contains(table)
    }

    /// Returns the names of dirty tables, sorted.
    pub fn dirty_tables(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Writes every dirty table to disk.
    ///
    /// The transaction is finished afterwards even if a write fails; the
    /// first error is returned once all tables have been attempted.
    pub(crate) fn commit(mut self, registry: &mut TableRegistry) -> CoreResult<()> {
        self.ensure_open()?;
        self.state = TransactionState::Committed;
        let names: Vec<String> = std::mem::take(&mut self.dirty).into_iter().collect();
        info!(txid = self.id, tables = names.len(), "committing transaction");
        if names.is_empty() {
            return Ok(());
        }
        registry.persist_all(Some(names.as_slice()))
    }

    /// Discards in-memory changes by reloading every dirty table from disk.
    pub(crate) fn rollback(mut self, registry: &mut TableRegistry) -> CoreResult<()> {
        self.ensure_open()?;
        self.state = TransactionState::RolledBack;
        let names: Vec<String> = std::mem::take(&mut self.dirty).into_iter().collect();
        info!(txid = self.id, tables = names.len(), "rolling back transaction");
        if names.is_empty() {
            return Ok(());
        }
        registry.reload_all(Some(names.as_slice()))
    }

    /// Ensures the transaction is open.
    fn ensure_open(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(CoreError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_is_open() {
        let txn = Transaction::new(1);
        assert!(txn.is_open());
        assert_eq!(txn.state(), TransactionState::Open);
        assert_eq!(txn.id(), 1);
        assert_eq!(txn.dirty_tables().count(), 0);
    }

    #[test]
    fn mark_dirty_is_idempotent() {
        let mut txn = Transaction::new(1);
        assert!(txn.mark_dirty("Orders"));
        assert!(!txn.mark_dirty("Orders"));
        assert!(txn.mark_dirty("Customers"));

        assert!(txn.is_dirty("Orders"));
        assert!(!txn.is_dirty("Products"));
        assert_eq!(
            txn.dirty_tables().collect::<Vec<_>>(),
            vec!["Customers", "Orders"]
        );
    }

    #[test]
    fn finished_transaction_rejects_reuse() {
        let mut txn = Transaction::new(1);
        txn.state = TransactionState::Committed;
        assert!(matches!(
            txn.ensure_open(),
            Err(CoreError::InvalidOperation { .. })
        ));

        txn.state = TransactionState::RolledBack;
        assert!(txn.ensure_open().is_err());
    }
}
