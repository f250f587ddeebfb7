//! Connections: requests in, table operations out.
//!
//! A [`Connection`] owns (or shares) a [`TableRegistry`]. Each request runs
//! to completion on the calling thread.
//!
//! # Shared registries
//!
//! When connection caching is enabled, connections to the same directory
//! share one registry behind a mutex, held for the whole of each request
//! including its file write. The open transaction belongs to the registry:
//! while one connection has a transaction open, writes from every sharing
//! connection defer into it and lazy reloads are suppressed for all of
//! them. Only the connection that began it can commit or roll it back, and
//! no other can begin one until it ends. An explicit
//! [`persist_all`](Connection::persist_all) or
//! [`reload_all`](Connection::reload_all) still bypasses it.

use crate::error::{CoreError, CoreResult};
use crate::filter::{Filter, ID_FIELD};
use crate::registry::TableRegistry;
use crate::request::Request;
use crate::rows::{ExecResult, Rows};
use crate::stats::{StatsSnapshot, StoreStats};
use fsdb_codec::{Record, RecordSet};
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// How a connection holds its registry.
#[derive(Debug)]
pub(crate) enum RegistryHandle {
    /// Owned outright; no locking.
    Private(TableRegistry),
    /// Shared with other connections to the same directory.
    Shared(Arc<Mutex<TableRegistry>>),
}

impl RegistryHandle {
    fn lock(&mut self) -> RegistryGuard<'_> {
        match self {
            Self::Private(registry) => RegistryGuard::Private(registry),
            Self::Shared(registry) => RegistryGuard::Shared(registry.lock()),
        }
    }
}

enum RegistryGuard<'a> {
    Private(&'a mut TableRegistry),
    Shared(MutexGuard<'a, TableRegistry>),
}

impl Deref for RegistryGuard<'_> {
    type Target = TableRegistry;

    fn deref(&self) -> &TableRegistry {
        match self {
            Self::Private(registry) => registry,
            Self::Shared(guard) => guard,
        }
    }
}

impl DerefMut for RegistryGuard<'_> {
    fn deref_mut(&mut self) -> &mut TableRegistry {
        match self {
            Self::Private(registry) => registry,
            Self::Shared(guard) => guard,
        }
    }
}

fn lock(handle: &mut Option<RegistryHandle>) -> CoreResult<RegistryGuard<'_>> {
    handle
        .as_mut()
        .map(RegistryHandle::lock)
        .ok_or_else(|| CoreError::invalid_operation("connection is closed"))
}

/// An open connection to a table directory.
#[derive(Debug)]
pub struct Connection {
    /// Directory path.
    dir: PathBuf,
    /// Tables, until closed.
    handle: Option<RegistryHandle>,
    /// ID of the transaction this connection began, while it is open.
    tx: Option<u64>,
    /// Counters of the registry.
    stats: Arc<StoreStats>,
}

impl Connection {
    pub(crate) fn new(dir: PathBuf, handle: RegistryHandle, stats: Arc<StoreStats>) -> Self {
        Self {
            dir,
            handle: Some(handle),
            tx: None,
            stats,
        }
    }

    /// Returns the directory this connection reads and writes.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns true if the registry is shared with other connections.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self.handle, Some(RegistryHandle::Shared(_)))
    }

    /// Returns true while a transaction begun on this connection is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Returns the ID of the transaction begun on this connection, if open.
    #[must_use]
    pub fn transaction_id(&self) -> Option<u64> {
        self.tx
    }

    /// Returns a snapshot of the registry's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs a write request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a select; use [`query`](Self::query).
    pub fn exec(&mut self, request: &Request) -> CoreResult<ExecResult> {
        match request {
            Request::CreateTable { name } => {
                self.create_table(name)?;
                Ok(ExecResult::default())
            }
            Request::DropTable { name } => {
                self.drop_table(name)?;
                Ok(ExecResult::default())
            }
            Request::InsertInto { name, record } => self.insert_into(name, record.clone()),
            Request::UpdateWhere { name, set, filter } => self.update_where(name, set, filter),
            Request::DeleteFrom { name, filter } => self.delete_from(name, filter),
            Request::SelectFrom { .. } => Err(CoreError::invalid_operation(
                "cannot exec 'selectFrom', use query",
            )),
        }
    }

    /// Runs a select request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for anything but a select; use
    /// [`exec`](Self::exec).
    pub fn query(&mut self, request: &Request) -> CoreResult<Rows> {
        match request {
            Request::SelectFrom { name, filter } => self.select_from(name, filter),
            other => Err(CoreError::invalid_operation(format!(
                "cannot query '{}', use exec",
                other.command()
            ))),
        }
    }

    /// Parses and runs a write statement.
    pub fn execute(&mut self, statement: &str) -> CoreResult<ExecResult> {
        self.exec(&Request::parse(statement)?)
    }

    /// Parses and runs a select statement.
    pub fn query_str(&mut self, statement: &str) -> CoreResult<Rows> {
        self.query(&Request::parse(statement)?)
    }

    fn create_table(&mut self, name: &str) -> CoreResult<()> {
        let mut registry = lock(&mut self.handle)?;
        if registry.contains(name) || registry.dir().has_table_file(name) {
            return Err(CoreError::table_exists(name));
        }
        let in_transaction = registry.in_transaction();
        let table = registry.get(name)?;
        // Always written, even in a transaction, so the file claims the name.
        table.persist(None)?;
        info!(table = name, in_transaction, "created table");
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> CoreResult<()> {
        let mut registry = lock(&mut self.handle)?;
        let registered = registry.unregister(name).is_some();
        match registry.dir().remove_table_file(name) {
            Ok(()) => {}
            Err(CoreError::TableNotFound { .. }) if registered => {}
            Err(e) => return Err(e),
        }
        info!(table = name, "dropped table");
        Ok(())
    }

    fn insert_into(&mut self, name: &str, record: Record) -> CoreResult<ExecResult> {
        let mut registry = lock(&mut self.handle)?;
        let (table, tx) = registry.get_with_tx(name)?;
        let id = table.insert(record, tx)?;
        Ok(ExecResult::inserted(id))
    }

    fn select_from(&mut self, name: &str, filter: &Filter) -> CoreResult<Rows> {
        Ok(Rows::new(self.fetch(name, filter)?))
    }

    /// Returns copies of the matching records of a table, keyed by ID.
    ///
    /// Like a select, without the row cursor.
    pub fn fetch(&mut self, name: &str, filter: &Filter) -> CoreResult<RecordSet> {
        let mut registry = lock(&mut self.handle)?;
        let (table, tx) = registry.get_with_tx(name)?;
        table.reload(true, tx.is_some())?;
        Ok(table.fetch(filter))
    }

    fn delete_from(&mut self, name: &str, filter: &Filter) -> CoreResult<ExecResult> {
        let mut registry = lock(&mut self.handle)?;
        let (table, tx) = registry.get_with_tx(name)?;
        table.reload(true, tx.is_some())?;
        let ids = table.matching_ids(filter);
        let removed = table.delete(&ids, tx)?;
        Ok(ExecResult::affected(removed))
    }

    fn update_where(&mut self, name: &str, set: &Record, filter: &Filter) -> CoreResult<ExecResult> {
        if set.contains_key(ID_FIELD) {
            return Err(CoreError::invalid_record(format!(
                "'{ID_FIELD}' is reserved and cannot be assigned"
            )));
        }
        let Self { handle, stats, .. } = self;
        let mut registry = lock(handle)?;
        let (table, tx) = registry.get_with_tx(name)?;
        if set.is_empty() {
            return Ok(ExecResult::affected(0));
        }

        // Outside a transaction, match against what is on disk now. Inside
        // one, keep the uncommitted writes.
        let in_tx = tx.is_some();
        table.reload(in_tx, in_tx)?;

        let ids = table.matching_ids(filter);
        let mut updated = 0u64;
        for id in &ids {
            if let Some(record) = table.record_mut(id) {
                for (field, value) in set {
                    record.insert(field.clone(), value.clone());
                }
                updated += 1;
            }
        }
        if updated > 0 {
            table.persist(tx)?;
            stats.record_updates(updated);
        }
        Ok(ExecResult::affected(updated))
    }

    /// Opens a transaction.
    ///
    /// Until [`commit`](Self::commit), writes stay in memory: they are
    /// visible to reads, but table files are untouched. With a shared
    /// registry this holds for every connection sharing it.
    ///
    /// # Errors
    ///
    /// Returns `TransactionActive` if one is already open on the registry.
    pub fn begin(&mut self) -> CoreResult<u64> {
        let Self {
            handle, tx, stats, ..
        } = self;
        let mut registry = lock(handle)?;
        if tx.is_some() {
            return Err(CoreError::TransactionActive);
        }
        let id = registry.begin()?;
        *tx = Some(id);
        stats.record_transaction_begin();
        Ok(id)
    }

    /// Writes every table dirtied since [`begin`](Self::begin).
    ///
    /// The transaction ends even if a write fails. Tables written before the
    /// failure stay written; there is no atomicity across tables.
    pub fn commit(&mut self) -> CoreResult<()> {
        let Self {
            handle, tx, stats, ..
        } = self;
        let mut registry = lock(handle)?;
        let tx = tx
            .take()
            .and_then(|id| registry.take_transaction(id))
            .ok_or_else(|| CoreError::invalid_operation("no transaction to commit"))?;
        let result = tx.commit(&mut registry);
        stats.record_transaction_commit();
        result
    }

    /// Discards uncommitted changes by reloading every dirtied table.
    pub fn rollback(&mut self) -> CoreResult<()> {
        let Self {
            handle, tx, stats, ..
        } = self;
        let mut registry = lock(handle)?;
        let tx = tx
            .take()
            .and_then(|id| registry.take_transaction(id))
            .ok_or_else(|| CoreError::invalid_operation("no transaction to roll back"))?;
        let result = tx.rollback(&mut registry);
        stats.record_transaction_rollback();
        result
    }

    /// Writes the named tables, or all tables, to disk now.
    ///
    /// Not needed in normal use: writes persist on their own, or on commit.
    /// This write bypasses any open transaction.
    pub fn persist_all(&mut self, names: Option<&[String]>) -> CoreResult<()> {
        lock(&mut self.handle)?.persist_all(names)
    }

    /// Re-syncs with the directory: picks up new table files, drops tables
    /// whose file is gone, and rereads the named tables, or all tables.
    ///
    /// Not needed in normal use: tables reload on their own when their file
    /// changes, except while a transaction is open.
    pub fn reload_all(&mut self, names: Option<&[String]>) -> CoreResult<()> {
        lock(&mut self.handle)?.reload_all(names)
    }

    /// Returns the names of all registered tables, sorted.
    pub fn table_names(&mut self) -> CoreResult<Vec<String>> {
        Ok(lock(&mut self.handle)?.names())
    }

    /// Returns the number of records in a table.
    pub fn count(&mut self, name: &str) -> CoreResult<usize> {
        let mut registry = lock(&mut self.handle)?;
        let (table, tx) = registry.get_with_tx(name)?;
        table.reload(true, tx.is_some())?;
        Ok(table.len())
    }

    /// Closes the connection.
    ///
    /// An open transaction is rolled back. A private registry is released;
    /// a shared one stays with the driver for the next connection.
    pub fn close(&mut self) -> CoreResult<()> {
        let mut result = Ok(());
        if self.tx.is_some() {
            info!(dir = %self.dir.display(), "rolling back open transaction on close");
            result = self.rollback();
        }
        if let Some(RegistryHandle::Private(mut registry)) = self.handle.take() {
            registry.clear();
        }
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.close() {
                warn!(dir = %self.dir.display(), error = %e, "error closing connection");
            }
        }
    }
}
