//! The set of tables known to a connection.
//!
//! A registry maps table names to loaded [`Table`]s for one directory. It
//! is owned by a single connection, or shared between connections to the
//! same directory when connection caching is enabled.
//!
//! The open transaction lives here too, not on a connection, so that every
//! connection sharing the tables also shares the deferral of their writes.

use crate::dir::TableDir;
use crate::error::{CoreError, CoreResult};
use crate::stats::StoreStats;
use crate::table::{Table, TableContext};
use crate::transaction::Transaction;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name-to-table map for one directory.
#[derive(Debug)]
pub struct TableRegistry {
    /// Directory holding the table files.
    dir: TableDir,
    /// Settings handed to every table.
    ctx: Arc<TableContext>,
    /// Registered tables.
    tables: HashMap<String, Table>,
    /// Open transaction, if any.
    tx: Option<Transaction>,
    /// ID for the next transaction.
    next_txid: u64,
}

impl TableRegistry {
    /// Creates an empty registry. Call [`init`](Self::init) to load tables.
    pub(crate) fn new(dir: TableDir, ctx: TableContext) -> Self {
        Self {
            dir,
            ctx: Arc::new(ctx),
            tables: HashMap::new(),
            tx: None,
            next_txid: 1,
        }
    }

    /// Registers and loads every table that has a file in the directory.
    ///
    /// Stops at the first table that fails to load.
    pub(crate) fn init(&mut self) -> CoreResult<()> {
        let names = self.dir.table_names()?;
        for name in &names {
            self.get(name)?;
        }
        info!(
            dir = %self.dir.path().display(),
            tables = names.len(),
            "loaded table directory"
        );
        Ok(())
    }

    /// Returns the table directory.
    #[must_use]
    pub fn dir(&self) -> &TableDir {
        &self.dir
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<StoreStats> {
        &self.ctx.stats
    }

    /// Returns whether a table is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the registered table names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the named table, registering and loading it on first use.
    ///
    /// A table without a file still registers, empty; it gets a file on its
    /// first persist.
    pub fn get(&mut self, name: &str) -> CoreResult<&mut Table> {
        if !self.tables.contains_key(name) {
            let path = self.dir.table_path(name)?;
            let mut table = Table::new(name, path, Arc::clone(&self.ctx));
            table.reload(false, false)?;
            debug!(table = name, records = table.len(), "registered table");
            self.tables.insert(name.to_string(), table);
        }
        self.tables
            .get_mut(name)
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    /// Returns the named table together with the open transaction, so that
    /// writes to the table defer into it.
    pub(crate) fn get_with_tx(
        &mut self,
        name: &str,
    ) -> CoreResult<(&mut Table, Option<&mut Transaction>)> {
        self.get(name)?;
        let Self { tables, tx, .. } = self;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| CoreError::table_not_found(name))?;
        Ok((table, tx.as_mut()))
    }

    /// Returns true while a transaction is open on these tables.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Returns the open transaction, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.tx.as_ref()
    }

    /// Opens a transaction and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns `TransactionActive` if one is already open, whichever
    /// connection opened it.
    pub(crate) fn begin(&mut self) -> CoreResult<u64> {
        if self.tx.is_some() {
            return Err(CoreError::TransactionActive);
        }
        let id = self.next_txid;
        self.next_txid += 1;
        self.tx = Some(Transaction::new(id));
        debug!(txid = id, "opened transaction");
        Ok(id)
    }

    /// Removes the open transaction if it has the given ID.
    pub(crate) fn take_transaction(&mut self, id: u64) -> Option<Transaction> {
        if self.tx.as_ref().is_some_and(|tx| tx.id() == id) {
            self.tx.take()
        } else {
            None
        }
    }

    /// Returns the named table only if it is already registered.
    pub fn get_registered(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Removes a table from the registry, leaving its file alone.
    pub(crate) fn unregister(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    /// Writes the named tables, or all registered tables, to disk.
    ///
    /// Names that aren't registered are skipped. Every table is attempted;
    /// the first failure is returned and later ones are logged.
    pub fn persist_all(&mut self, names: Option<&[String]>) -> CoreResult<()> {
        let targets = self.targets(names);
        let mut first_err = None;
        for name in targets {
            let Some(table) = self.tables.get_mut(&name) else {
                continue;
            };
            if let Err(e) = table.persist(None) {
                if first_err.is_none() {
                    first_err = Some(e);
                } else {
                    warn!(table = %name, error = %e, "failed to persist table");
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Re-syncs the registry with the directory.
    ///
    /// Tables whose file has disappeared are evicted, tables with a new file
    /// are registered, and the named tables (all, if `None`) are reloaded
    /// unconditionally. Registered tables that never had a file are kept.
    ///
    /// Every table is attempted; the first failure is returned and later
    /// ones are logged.
    pub fn reload_all(&mut self, names: Option<&[String]>) -> CoreResult<()> {
        let on_disk = self.dir.table_names()?;

        let vanished: Vec<String> = self
            .tables
            .iter()
            .filter(|(name, table)| table.exists_on_disk() && !on_disk.contains(*name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in vanished {
            debug!(table = %name, "evicting table with no file");
            self.tables.remove(&name);
        }

        let mut first_err = None;
        let mut note = |name: &str, e: CoreError| {
            if first_err.is_none() {
                first_err = Some(e);
            } else {
                warn!(table = %name, error = %e, "failed to reload table");
            }
        };
        for name in self.targets(names) {
            if let Some(table) = self.tables.get_mut(&name) {
                if let Err(e) = table.reload(false, false) {
                    note(&name, e);
                }
            }
        }
        for name in &on_disk {
            if let Err(e) = self.get(name) {
                note(name, e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Drops every table from memory.
    pub(crate) fn clear(&mut self) {
        self.tables.clear();
    }

    fn targets(&self, names: Option<&[String]>) -> Vec<String> {
        match names {
            Some(names) => names.to_vec(),
            None => self.names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdStrategy;
    use fsdb_codec::{record, JsonFormat, TableFormat};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn registry(temp: &TempDir) -> TableRegistry {
        let dir = TableDir::open(temp.path(), ".jsondbt", true).unwrap();
        let ctx = TableContext {
            format: Arc::new(JsonFormat),
            stats: Arc::new(StoreStats::new()),
            id_strategy: IdStrategy::Timestamp,
            loose_compare: false,
        };
        let mut reg = TableRegistry::new(dir, ctx);
        reg.init().unwrap();
        reg
    }

    #[test]
    fn init_loads_existing_tables() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("A.jsondbt"), br#"{"1": {"x": 1}}"#).unwrap();
        fs::write(temp.path().join("B.jsondbt"), b"{}").unwrap();
        fs::write(temp.path().join("skip.txt"), b"").unwrap();

        let mut reg = registry(&temp);
        assert_eq!(reg.names(), vec!["A", "B"]);
        assert_eq!(reg.get("A").unwrap().len(), 1);
        assert_eq!(reg.stats().file_reads(), 2);
    }

    #[test]
    fn init_fails_on_corrupt_table() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("Bad.jsondbt"), b"[").unwrap();

        let dir = TableDir::open(temp.path(), ".jsondbt", true).unwrap();
        let ctx = TableContext {
            format: Arc::new(JsonFormat),
            stats: Arc::new(StoreStats::new()),
            id_strategy: IdStrategy::Timestamp,
            loose_compare: false,
        };
        let mut reg = TableRegistry::new(dir, ctx);
        assert!(matches!(reg.init(), Err(CoreError::Codec(_))));
    }

    #[test]
    fn get_registers_tables_without_files() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);

        assert!(reg.get("New").unwrap().is_empty());
        assert!(reg.contains("New"));
        assert!(!temp.path().join("New.jsondbt").exists());
        assert!(reg.get("../escape").is_err());
    }

    #[test]
    fn persist_all_writes_named_tables_only() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        reg.get("A").unwrap();
        reg.get("B").unwrap();

        reg.persist_all(Some(&["A".to_string(), "Ghost".to_string()]))
            .unwrap();
        assert!(temp.path().join("A.jsondbt").exists());
        assert!(!temp.path().join("B.jsondbt").exists());

        reg.persist_all(None).unwrap();
        assert!(temp.path().join("B.jsondbt").exists());
    }

    #[test]
    fn reload_all_reconciles_with_directory() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("Old.jsondbt"), b"{}").unwrap();
        let mut reg = registry(&temp);
        reg.get("Unsaved").unwrap();

        fs::remove_file(temp.path().join("Old.jsondbt")).unwrap();
        fs::write(temp.path().join("Fresh.jsondbt"), br#"{"a": {}}"#).unwrap();

        reg.reload_all(None).unwrap();
        assert_eq!(reg.names(), vec!["Fresh", "Unsaved"]);
        assert_eq!(reg.get("Fresh").unwrap().len(), 1);
    }

    #[test]
    fn reload_all_discards_unpersisted_changes() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        reg.get("T").unwrap().insert(record! { "n" => 1 }, None).unwrap();

        let mut tx = Transaction::new(1);
        reg.get("T")
            .unwrap()
            .insert(record! { "n" => 2 }, Some(&mut tx))
            .unwrap();
        assert_eq!(reg.get("T").unwrap().len(), 2);

        reg.reload_all(Some(&["T".to_string()])).unwrap();
        assert_eq!(reg.get("T").unwrap().len(), 1);
    }

    #[test]
    fn persist_all_attempts_every_table() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        for name in ["A", "B", "C"] {
            reg.get(name).unwrap().insert(record! { "n" => 1 }, None).unwrap();
        }
        for name in ["A", "B", "C"] {
            reg.get(name)
                .unwrap()
                .insert(record! { "n" => 2 }, Some(&mut Transaction::new(1)))
                .unwrap();
        }
        // A directory in place of B's file makes the rename fail.
        fs::remove_file(temp.path().join("B.jsondbt")).unwrap();
        fs::create_dir(temp.path().join("B.jsondbt")).unwrap();

        let err = reg.persist_all(None).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        for name in ["A", "C"] {
            let bytes = fs::read(temp.path().join(format!("{name}.jsondbt"))).unwrap();
            assert_eq!(JsonFormat.decode(&bytes).unwrap().len(), 2, "{name}");
        }
    }

    #[test]
    fn reload_all_attempts_every_table() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        for name in ["A", "B", "C"] {
            reg.get(name).unwrap().insert(record! { "n" => 1 }, None).unwrap();
            reg.get(name)
                .unwrap()
                .insert(record! { "n" => 2 }, Some(&mut Transaction::new(1)))
                .unwrap();
        }
        fs::write(temp.path().join("B.jsondbt"), b"{").unwrap();
        fs::write(temp.path().join("New.jsondbt"), br#"{"x": {}}"#).unwrap();

        let err = reg.reload_all(None).unwrap_err();
        assert!(matches!(err, CoreError::Codec(_)));
        assert_eq!(reg.get("A").unwrap().len(), 1);
        assert_eq!(reg.get("C").unwrap().len(), 1);
        assert_eq!(reg.get("New").unwrap().len(), 1);
        // The unreadable table keeps what it had.
        assert_eq!(reg.get("B").unwrap().len(), 2);
    }

    #[test]
    fn rollback_restores_tables_after_an_unreadable_one() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        for name in ["A", "B"] {
            reg.get(name).unwrap().insert(record! { "n" => 1 }, None).unwrap();
        }
        let id = reg.begin().unwrap();
        for name in ["A", "B"] {
            let (table, tx) = reg.get_with_tx(name).unwrap();
            table.insert(record! { "n" => 2 }, tx).unwrap();
        }
        fs::write(temp.path().join("A.jsondbt"), b"{").unwrap();

        let tx = reg.take_transaction(id).unwrap();
        assert!(matches!(tx.rollback(&mut reg), Err(CoreError::Codec(_))));
        assert_eq!(reg.get("B").unwrap().len(), 1);
        assert!(!reg.in_transaction());
    }

    #[test]
    fn one_transaction_at_a_time() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        let id = reg.begin().unwrap();
        assert!(reg.in_transaction());
        assert!(matches!(reg.begin(), Err(CoreError::TransactionActive)));

        // Only the ID that opened the transaction can take it back.
        assert!(reg.take_transaction(id + 1).is_none());
        assert_eq!(reg.transaction().map(Transaction::id), Some(id));
        assert!(reg.take_transaction(id).is_some());
        assert_eq!(reg.begin().unwrap(), id + 1);
    }

    #[test]
    fn writes_defer_into_open_transaction() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        reg.begin().unwrap();
        let (table, tx) = reg.get_with_tx("T").unwrap();
        table.insert(record! { "n" => 1 }, tx).unwrap();

        assert!(!temp.path().join("T.jsondbt").exists());
        assert!(reg.transaction().unwrap().is_dirty("T"));
    }

    #[test]
    fn clear_empties_registry() {
        let temp = tempdir().unwrap();
        let mut reg = registry(&temp);
        reg.get("A").unwrap();
        reg.clear();
        assert!(reg.names().is_empty());
        assert!(reg.unregister("A").is_none());
    }
}
