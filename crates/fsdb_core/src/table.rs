//! In-memory tables mirrored to one file each.
//!
//! A [`Table`] moves through `Unloaded -> Loaded -> (Stale -> Loaded)*`.
//! It becomes stale when its file's modification time passes the time of
//! the last load or persist; [`Table::reload`] with `lazy = true` only
//! rereads the file in that case, and never while a transaction is open,
//! so uncommitted writes are not clobbered by an outside edit.

use crate::config::IdStrategy;
use crate::dir;
use crate::error::{CoreError, CoreResult};
use crate::filter::{candidate_id, Filter, ID_FIELD};
use crate::stats::StoreStats;
use crate::transaction::Transaction;
use fsdb_codec::{Record, RecordId, RecordSet, TableFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Settings shared by every table of a registry.
pub(crate) struct TableContext {
    /// Encoder/decoder for table files.
    pub(crate) format: Arc<dyn TableFormat>,
    /// Counters.
    pub(crate) stats: Arc<StoreStats>,
    /// How new record IDs are chosen.
    pub(crate) id_strategy: IdStrategy,
    /// Whether matching falls back to string comparison.
    pub(crate) loose_compare: bool,
}

impl std::fmt::Debug for TableContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableContext")
            .field("extension", &self.format.file_extension())
            .field("id_strategy", &self.id_strategy)
            .field("loose_compare", &self.loose_compare)
            .finish_non_exhaustive()
    }
}

/// One table's records and the file that backs them.
#[derive(Debug)]
pub struct Table {
    /// Table name.
    name: String,
    /// `<dir>/<name><extension>`.
    path: PathBuf,
    /// Shared settings.
    ctx: Arc<TableContext>,
    /// Current records.
    records: RecordSet,
    /// When the records were last read from or written to the file.
    last_load: Option<SystemTime>,
    /// Whether the file existed at the last load or persist.
    on_disk: bool,
    /// Highest timestamp ID handed out by this table.
    last_issued: u64,
}

impl Table {
    /// Creates an unloaded table bound to a file path.
    pub(crate) fn new(name: impl Into<String>, path: PathBuf, ctx: Arc<TableContext>) -> Self {
        Self {
            name: name.into(),
            path,
            ctx,
            records: RecordSet::new(),
            last_load: None,
            on_disk: false,
            last_issued: 0,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true once the table has been loaded at least once.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.last_load.is_some()
    }

    /// Returns whether the backing file existed at the last load or persist.
    #[must_use]
    pub fn exists_on_disk(&self) -> bool {
        self.on_disk
    }

    /// Returns the time of the last load or persist.
    #[must_use]
    pub fn last_load(&self) -> Option<SystemTime> {
        self.last_load
    }

    /// Returns all records currently in memory.
    #[must_use]
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Rereads the backing file.
    ///
    /// With `lazy`, the file is only read if the table was never loaded, or
    /// if its modification time is newer than the last load and no
    /// transaction is open. Without `lazy`, it is always read.
    ///
    /// A table that has never had a file loads as empty. A table whose file
    /// has disappeared since it was loaded is an error.
    ///
    /// Returns true if the file was read.
    pub fn reload(&mut self, lazy: bool, in_transaction: bool) -> CoreResult<bool> {
        let Some(modified) = dir::modified_time(&self.path)? else {
            return self.reload_missing(lazy);
        };

        let stale = match self.last_load {
            None => true,
            Some(_) if !lazy => true,
            Some(last) => !in_transaction && modified > last,
        };
        if !stale {
            return Ok(false);
        }

        let Some(bytes) = dir::read_file(&self.path)? else {
            return self.reload_missing(lazy);
        };
        let records = self.ctx.format.decode(&bytes)?;
        self.ctx.stats.record_file_read();
        debug!(
            table = %self.name,
            records = records.len(),
            lazy,
            "reloaded table"
        );

        self.records = records;
        self.last_load = Some(SystemTime::now());
        self.on_disk = true;
        Ok(true)
    }

    fn reload_missing(&mut self, lazy: bool) -> CoreResult<bool> {
        if self.on_disk {
            return Err(CoreError::table_not_found(&self.name));
        }
        if !lazy {
            self.records.clear();
        }
        if self.last_load.is_none() {
            self.last_load = Some(SystemTime::now());
        }
        Ok(false)
    }

    /// Returns every record matching the filter.
    ///
    /// If the filter names record IDs, only those IDs are looked up;
    /// otherwise every record is scanned. Unknown IDs are skipped.
    #[must_use]
    pub fn fetch(&self, filter: &Filter) -> RecordSet {
        self.select(filter)
            .into_iter()
            .map(|(id, rec)| (id.clone(), rec.clone()))
            .collect()
    }

    /// Returns the IDs of every record matching the filter.
    #[must_use]
    pub fn matching_ids(&self, filter: &Filter) -> Vec<RecordId> {
        self.select(filter)
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn select<'a>(&'a self, filter: &Filter) -> Vec<(&'a RecordId, &'a Record)> {
        let loose = self.ctx.loose_compare;
        match filter.candidates(ID_FIELD) {
            Some(ids) if !ids.is_empty() => {
                self.ctx.stats.record_fetch(true);
                let mut found = Vec::with_capacity(ids.len());
                for id in ids.iter().filter_map(|c| candidate_id(c, loose)) {
                    if let Some((key, rec)) = self.records.get_key_value(&id) {
                        // The ID filter is already satisfied; "" skips it.
                        if filter.matches("", rec, loose)
                            && !found.iter().any(|(k, _)| *k == key)
                        {
                            found.push((key, rec));
                        }
                    }
                }
                found
            }
            _ => {
                self.ctx.stats.record_fetch(false);
                self.records
                    .iter()
                    .filter(|(id, rec)| filter.matches(id, rec, loose))
                    .collect()
            }
        }
    }

    /// Adds a record under a new ID and persists the table.
    ///
    /// If persisting fails, the record is removed again and the table is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// - `InvalidRecord` if the record uses the reserved ID field
    /// - `DuplicateRecordId` if the new ID is already taken
    /// - any reload or persist error
    pub fn insert(
        &mut self,
        record: Record,
        tx: Option<&mut Transaction>,
    ) -> CoreResult<RecordId> {
        if record.contains_key(ID_FIELD) {
            return Err(CoreError::invalid_record(format!(
                "'{ID_FIELD}' is reserved and cannot be stored"
            )));
        }
        self.reload(true, tx.is_some())?;

        let id = self.next_id();
        if self.records.contains_key(&id) {
            return Err(CoreError::DuplicateRecordId {
                table: self.name.clone(),
                id,
            });
        }

        self.records.insert(id.clone(), record);
        if let Err(e) = self.persist(tx) {
            self.records.remove(&id);
            return Err(e);
        }
        self.ctx.stats.record_insert();
        Ok(id)
    }

    fn next_id(&mut self) -> RecordId {
        match self.ctx.id_strategy {
            IdStrategy::Sequential => self.records.len().to_string(),
            IdStrategy::Timestamp => {
                #[allow(clippy::cast_possible_truncation)]
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_nanos() as u64);
                self.last_issued = now.max(self.last_issued + 1);
                self.last_issued.to_string()
            }
        }
    }

    /// Removes the given records and persists the table if any were present.
    ///
    /// IDs not in the table are ignored. Returns the number removed.
    pub fn delete(&mut self, ids: &[RecordId], tx: Option<&mut Transaction>) -> CoreResult<u64> {
        self.reload(true, tx.is_some())?;

        let mut removed = 0u64;
        for id in ids {
            if self.records.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.persist(tx)?;
            self.ctx.stats.record_deletes(removed);
        }
        Ok(removed)
    }

    /// Returns a record for in-place modification.
    pub(crate) fn record_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    /// Writes the full record set to the backing file.
    ///
    /// With an open transaction the write is deferred instead: the table
    /// is marked dirty and written when the transaction commits.
    pub fn persist(&mut self, tx: Option<&mut Transaction>) -> CoreResult<()> {
        if let Some(tx) = tx {
            if tx.mark_dirty(&self.name) {
                debug!(table = %self.name, txid = tx.id(), "deferred persist to commit");
            }
            return Ok(());
        }

        let bytes = self.ctx.format.encode(&self.records)?;
        dir::write_file(&self.path, &bytes)?;
        self.ctx.stats.record_file_write(bytes.len() as u64);
        debug!(
            table = %self.name,
            records = self.records.len(),
            bytes = bytes.len(),
            "persisted table"
        );

        self.last_load = Some(SystemTime::now());
        self.on_disk = true;
        Ok(())
    }
}
