//! Store statistics.
//!
//! Counters are shared by every table of a registry, and therefore by every
//! connection that shares that registry.
//!
//! # Usage
//!
//! ```rust,ignore
//! let before = conn.stats();
//! conn.exec(&Request::update_where("Customers", set, filter))?;
//! let after = conn.stats();
//! assert_eq!(after.file_writes - before.file_writes, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Store statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    // Query counters
    /// Fetch calls.
    fetches: AtomicU64,
    /// Fetches that scanned every record.
    scans: AtomicU64,
    /// Fetches served by direct ID lookup.
    id_lookups: AtomicU64,

    // Mutation counters
    /// Records inserted.
    inserts: AtomicU64,
    /// Records deleted.
    deletes: AtomicU64,
    /// Records updated.
    updates: AtomicU64,

    // File counters
    /// Table files read.
    file_reads: AtomicU64,
    /// Table files written.
    file_writes: AtomicU64,
    /// Total bytes written.
    bytes_written: AtomicU64,

    // Transaction counters
    /// Transactions begun.
    transactions_begun: AtomicU64,
    /// Transactions committed.
    transactions_committed: AtomicU64,
    /// Transactions rolled back.
    transactions_rolled_back: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fetch(&self, by_id: bool) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if by_id {
            self.id_lookups.fetch_add(1, Ordering::Relaxed);
        } else {
            self.scans.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_updates(&self, count: u64) {
        self.updates.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_file_read(&self) {
        self.file_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_write(&self, bytes: u64) {
        self.file_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_begin(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of table files written.
    pub fn file_writes(&self) -> u64 {
        self.file_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of table files read.
    pub fn file_reads(&self) -> u64 {
        self.file_reads.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            id_lookups: self.id_lookups.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            file_reads: self.file_reads(),
            file_writes: self.file_writes(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Fetch calls.
    pub fetches: u64,
    /// Fetches that scanned every record.
    pub scans: u64,
    /// Fetches served by direct ID lookup.
    pub id_lookups: u64,
    /// Records inserted.
    pub inserts: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Records updated.
    pub updates: u64,
    /// Table files read.
    pub file_reads: u64,
    /// Table files written.
    pub file_writes: u64,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Transactions begun.
    pub transactions_begun: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
}
