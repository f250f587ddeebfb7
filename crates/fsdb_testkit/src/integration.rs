//! Cross-crate integration test helpers.
//!
//! Provides a model-checking harness that mirrors every request in an
//! in-memory map, plus reusable property checks that run against any
//! table format.

use crate::fixtures::TestDir;
use crate::generators::TableOperation;
use fsdb_codec::{Record, RecordId, RecordSet, Value};
use fsdb_core::{matches, Connection, Filter, Request};
use std::collections::BTreeMap;

/// A test harness that checks a connection against a model.
pub struct IntegrationHarness {
    /// The connection under test.
    pub conn: Connection,
    /// The directory (kept alive to prevent cleanup).
    pub dir: TestDir,
    /// Expected contents of every table.
    model: BTreeMap<String, RecordSet>,
    /// Model as of the open transaction's start.
    snapshot: Option<BTreeMap<String, RecordSet>>,
}

impl IntegrationHarness {
    /// Creates a harness over a new JSON directory.
    pub fn new() -> Self {
        Self::with_dir(TestDir::json())
    }

    /// Creates a harness over the given directory.
    pub fn with_dir(dir: TestDir) -> Self {
        Self {
            conn: dir.open(),
            dir,
            model: BTreeMap::new(),
            snapshot: None,
        }
    }

    /// Creates a table and tracks it.
    pub fn create_table(&mut self, table: &str) {
        self.conn
            .exec(&Request::create_table(table))
            .expect("Failed to create table");
        self.model.insert(table.to_owned(), RecordSet::new());
    }

    /// Inserts a record and tracks it under the returned ID.
    pub fn insert(&mut self, table: &str, record: Record) -> RecordId {
        let id = self
            .conn
            .exec(&Request::insert_into(table, record.clone()))
            .expect("Failed to insert")
            .last_insert_id
            .expect("Insert returned no ID");
        let previous = self.model.entry(table.to_owned()).or_default().insert(id.clone(), record);
        assert!(previous.is_none(), "ID {id} was issued twice");
        id
    }

    /// Runs one generated operation against both the connection and the
    /// model, and checks that they agree on the outcome.
    pub fn apply(&mut self, table: &str, op: &TableOperation) {
        let filter = match op {
            TableOperation::Insert { record } => {
                self.insert(table, record.clone());
                return;
            }
            TableOperation::Update { filter, .. }
            | TableOperation::Delete { filter }
            | TableOperation::Select { filter } => filter,
        };

        let request = op.to_request(table);
        let expected = self.expected_matches(table, filter);
        if request.is_query() {
            let rows = self.conn.query(&request).expect("Failed to select");
            let got: Vec<RecordId> = rows.map(|row| row.id().to_owned()).collect();
            assert_eq!(got, expected, "select mismatch for {op:?}");
            return;
        }

        let affected = self.conn.exec(&request).expect("Failed to execute").affected_rows;
        let records = self.model.entry(table.to_owned()).or_default();
        match op {
            TableOperation::Update { set, .. } if set.is_empty() => {
                assert_eq!(affected, 0, "empty update changed rows");
            }
            TableOperation::Update { set, .. } => {
                assert_eq!(affected, expected.len() as u64, "update count for {op:?}");
                for id in &expected {
                    if let Some(rec) = records.get_mut(id) {
                        rec.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
            }
            TableOperation::Delete { .. } => {
                assert_eq!(affected, expected.len() as u64, "delete count for {op:?}");
                for id in &expected {
                    records.remove(id);
                }
            }
            TableOperation::Insert { .. } | TableOperation::Select { .. } => {}
        }
    }

    /// Opens a transaction on the connection and snapshots the model.
    pub fn begin(&mut self) {
        self.conn.begin().expect("Failed to begin");
        self.snapshot = Some(self.model.clone());
    }

    /// Commits the open transaction.
    pub fn commit(&mut self) {
        self.conn.commit().expect("Failed to commit");
        self.snapshot = None;
    }

    /// Rolls back the open transaction and restores the model.
    pub fn rollback(&mut self) {
        self.conn.rollback().expect("Failed to roll back");
        if let Some(snapshot) = self.snapshot.take() {
            self.model = snapshot;
        }
    }

    /// Verifies every tracked table through the connection.
    pub fn verify_all(&mut self) {
        for (table, expected) in &self.model {
            let actual = self
                .conn
                .fetch(table, &Filter::new())
                .expect("Failed to fetch");
            assert_eq!(&actual, expected, "table {table} differs from model");
        }
    }

    /// Verifies every tracked table's file. Only meaningful outside a
    /// transaction.
    pub fn verify_on_disk(&self) {
        for (table, expected) in &self.model {
            assert_eq!(
                &self.dir.read_table(table),
                expected,
                "file of table {table} differs from model"
            );
        }
    }

    /// Verifies a fresh connection sees the same tables.
    pub fn verify_reopen(&self) {
        let mut fresh = self.dir.open_fresh();
        for (table, expected) in &self.model {
            let actual = fresh.fetch(table, &Filter::new()).expect("Failed to fetch");
            assert_eq!(&actual, expected, "reopened table {table} differs from model");
        }
    }

    /// Returns the model of a table.
    pub fn expected(&self, table: &str) -> Option<&RecordSet> {
        self.model.get(table)
    }

    /// Returns the count of tracked records across all tables.
    pub fn tracked_count(&self) -> usize {
        self.model.values().map(BTreeMap::len).sum()
    }

    fn expected_matches(&self, table: &str, filter: &Filter) -> Vec<RecordId> {
        self.model
            .get(table)
            .map(|records| {
                records
                    .iter()
                    .filter(|(id, rec)| matches(id, rec, filter, false))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks of the store's core guarantees, usable with any directory.
pub mod properties {
    use super::*;
    use fsdb_codec::record;

    /// Inserted records come back unchanged from the connection, the file,
    /// and a fresh connection.
    pub fn check_round_trip(dir: TestDir, records: Vec<Record>) {
        let mut harness = IntegrationHarness::with_dir(dir);
        harness.create_table("RoundTrip");
        for rec in records {
            harness.insert("RoundTrip", rec);
        }
        harness.verify_all();
        harness.verify_on_disk();
        harness.verify_reopen();
    }

    /// Every insert gets a distinct ID, even many inside one transaction.
    pub fn check_id_uniqueness(dir: TestDir, count: usize) {
        let mut harness = IntegrationHarness::with_dir(dir);
        harness.create_table("Ids");
        harness.begin();
        for i in 0..count {
            let n = i64::try_from(i).expect("Index out of range");
            harness.insert("Ids", record! { "n" => n });
        }
        harness.commit();
        assert_eq!(harness.tracked_count(), count);
        harness.verify_on_disk();
    }

    /// An `__id` filter returns exactly the named records, skipping
    /// unknown IDs.
    pub fn check_id_filter(dir: TestDir) {
        let mut conn = dir.open();
        let ids = crate::fixtures::scenarios::numbered(&mut conn, "T", 6);
        let wanted = [ids[1].clone(), ids[4].clone(), "missing".to_owned()];

        let got: Vec<RecordId> = conn
            .query(&Request::select_from("T", Filter::new().ids(wanted.clone())))
            .expect("Failed to select")
            .map(|row| row.id().to_owned())
            .collect();
        assert_eq!(got, vec![ids[1].clone(), ids[4].clone()]);

        let narrowed = conn
            .fetch("T", &Filter::new().ids(wanted).equals("Index", 4))
            .expect("Failed to fetch");
        assert_eq!(narrowed.keys().collect::<Vec<_>>(), vec![&ids[4]]);
    }

    /// Writes in a transaction leave files untouched until commit, and a
    /// rollback restores what the files hold.
    pub fn check_deferred_persistence(dir: TestDir) {
        let mut harness = IntegrationHarness::with_dir(dir);
        harness.create_table("Deferred");
        harness.insert("Deferred", record! { "a" => 1 });
        harness.verify_on_disk();

        harness.begin();
        let before = harness.dir.read_table("Deferred");
        harness.insert("Deferred", record! { "a" => 2 });
        harness.apply(
            "Deferred",
            &TableOperation::Delete {
                filter: Filter::new().equals("a", 1),
            },
        );
        harness.verify_all();
        assert_eq!(harness.dir.read_table("Deferred"), before);
        harness.rollback();
        harness.verify_all();

        harness.begin();
        harness.insert("Deferred", record! { "a" => 3 });
        harness.commit();
        harness.verify_on_disk();
    }

    /// Deleting the same records twice removes them once.
    pub fn check_delete_idempotence(dir: TestDir) {
        let mut conn = dir.open();
        crate::fixtures::scenarios::customers(&mut conn, 1);
        let filter = Filter::new().equals("City", "Berlin");

        let first = conn
            .exec(&Request::delete_from("Customers", filter.clone()))
            .expect("Failed to delete");
        let second = conn
            .exec(&Request::delete_from("Customers", filter))
            .expect("Failed to delete");
        assert_eq!(first.affected_rows, 3);
        assert_eq!(second.affected_rows, 0);
        assert_eq!(conn.count("Customers").expect("Failed to count"), 6);
    }

    /// An update assigns its fields to every match and writes the file once.
    pub fn check_update_batch(dir: TestDir) {
        let mut conn = dir.open();
        crate::fixtures::scenarios::customers(&mut conn, 2);
        let writes_before = conn.stats().file_writes;

        let res = conn
            .exec(&Request::update_where(
                "Customers",
                record! { "City" => "Seattle", "Moved" => true },
                Filter::new().equals("City", "Berlin").equals("FirstName", "Alice"),
            ))
            .expect("Failed to update");
        assert_eq!(res.affected_rows, 2);
        assert_eq!(conn.stats().file_writes, writes_before + 1);

        let on_disk = dir.read_table("Customers");
        let moved = on_disk
            .values()
            .filter(|rec| rec.contains_key("Moved"))
            .count();
        assert_eq!(moved, 2);
        assert!(on_disk
            .values()
            .filter(|rec| rec.contains_key("Moved"))
            .all(|rec| rec["City"] == Value::from("Seattle") && rec["FirstName"] == Value::from("Alice")));
    }

    /// Reloading picks up table files created and removed by others.
    pub fn check_registry_reconciliation(dir: TestDir) {
        let mut conn = dir.open();
        crate::fixtures::scenarios::numbered(&mut conn, "Kept", 1);
        crate::fixtures::scenarios::numbered(&mut conn, "Gone", 1);

        let mut outside = RecordSet::new();
        outside.insert("x1".to_owned(), record! { "from" => "outside" });
        dir.write_table_externally("Added", &outside);
        dir.remove_table_externally("Gone");

        conn.reload_all(None).expect("Failed to reload");
        assert_eq!(
            conn.table_names().expect("Failed to list"),
            vec!["Added".to_owned(), "Kept".to_owned()]
        );
        assert_eq!(conn.fetch("Added", &Filter::new()).expect("Failed to fetch"), outside);
    }

    /// Connections from a caching driver see each other's writes at once,
    /// and share the open transaction.
    pub fn check_shared_mode(dir: TestDir) {
        assert!(dir.driver.connection_caching(), "driver must share tables");
        let mut a = dir.open();
        let mut b = dir.open();
        assert!(a.is_shared() && b.is_shared());

        let id = a
            .exec(&Request::insert_into("Shared", record! { "v" => 1 }))
            .expect("Failed to insert")
            .last_insert_id
            .expect("Insert returned no ID");
        let seen = b
            .fetch("Shared", &Filter::new().ids([id.clone()]))
            .expect("Failed to fetch");
        assert_eq!(seen.get(&id), Some(&record! { "v" => 1 }));

        // A transaction on one connection holds back the other's writes too.
        a.begin().expect("Failed to begin");
        b.exec(&Request::insert_into("Shared", record! { "v" => 2 }))
            .expect("Failed to insert");
        assert_eq!(dir.read_table("Shared").len(), 1);
        a.commit().expect("Failed to commit");
        assert_eq!(dir.read_table("Shared").len(), 2);
    }
}
