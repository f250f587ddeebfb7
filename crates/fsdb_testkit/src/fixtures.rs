//! Test fixtures and connection helpers.
//!
//! Provides temporary table directories that clean up after themselves,
//! and helpers for editing table files behind a connection's back.

use fsdb_codec::{JsonFormat, RecordSet, TableFormat, TomlFormat};
use fsdb_core::{Config, Connection, Driver};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A temporary table directory with a driver for it.
pub struct TestDir {
    /// Format used by the driver, kept for reading files directly.
    format: Arc<dyn TableFormat>,
    /// The driver.
    pub driver: Driver,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestDir {
    /// Creates a JSON table directory with default configuration.
    pub fn json() -> Self {
        Self::with_format(Arc::new(JsonFormat::new()), Config::default())
    }

    /// Creates a TOML table directory with default configuration.
    pub fn toml() -> Self {
        Self::with_format(Arc::new(TomlFormat::new()), Config::default())
    }

    /// Creates a JSON table directory whose connections share tables.
    pub fn shared() -> Self {
        Self::with_format(
            Arc::new(JsonFormat::new()),
            Config::new().connection_caching(true),
        )
    }

    /// Creates a table directory with the given format and configuration.
    pub fn with_format(format: Arc<dyn TableFormat>, config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            driver: Driver::new(Arc::clone(&format), config),
            format,
            temp_dir,
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a connection to the directory.
    pub fn open(&self) -> Connection {
        self.driver
            .open(self.path())
            .expect("Failed to open connection")
    }

    /// Opens a connection with a fresh private driver, bypassing any cache.
    pub fn open_fresh(&self) -> Connection {
        let config = self.driver.config().clone().connection_caching(false);
        Driver::new(Arc::clone(&self.format), config)
            .open(self.path())
            .expect("Failed to open connection")
    }

    /// Returns the path of a table's file.
    pub fn table_file(&self, table: &str) -> PathBuf {
        self.path()
            .join(format!("{table}{}", self.driver.file_extension()))
    }

    /// Returns whether a table's file exists.
    pub fn has_file(&self, table: &str) -> bool {
        self.table_file(table).is_file()
    }

    /// Decodes a table's file as it is on disk right now.
    pub fn read_table(&self, table: &str) -> RecordSet {
        let bytes = fs::read(self.table_file(table)).expect("Failed to read table file");
        self.format.decode(&bytes).expect("Failed to decode table file")
    }

    /// Rewrites a table's file as another process would, dated in the future
    /// so a lazy reload is guaranteed to notice it.
    pub fn write_table_externally(&self, table: &str, records: &RecordSet) {
        let bytes = self.format.encode(records).expect("Failed to encode table");
        let path = self.table_file(table);
        fs::write(&path, bytes).expect("Failed to write table file");
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(later))
            .expect("Failed to set modification time");
    }

    /// Deletes a table's file as another process would.
    pub fn remove_table_externally(&self, table: &str) {
        fs::remove_file(self.table_file(table)).expect("Failed to remove table file");
    }
}

/// A connection that owns its temporary directory.
pub struct TestConnection {
    /// The connection.
    pub conn: Connection,
    /// The directory (kept alive to prevent cleanup).
    pub dir: TestDir,
}

impl TestConnection {
    /// Opens a connection to a new JSON directory.
    pub fn json() -> Self {
        Self::open(TestDir::json())
    }

    /// Opens a connection to a new TOML directory.
    pub fn toml() -> Self {
        Self::open(TestDir::toml())
    }

    /// Opens a connection to the given directory.
    pub fn open(dir: TestDir) -> Self {
        Self {
            conn: dir.open(),
            dir,
        }
    }
}

impl std::ops::Deref for TestConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for TestConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Runs a test with a connection to a temporary JSON directory.
///
/// # Example
///
/// ```rust,ignore
/// use fsdb_testkit::with_temp_conn;
///
/// #[test]
/// fn my_test() {
///     with_temp_conn(|conn| {
///         conn.exec(&Request::create_table("T")).unwrap();
///     });
/// }
/// ```
pub fn with_temp_conn<F, R>(f: F) -> R
where
    F: FnOnce(&mut Connection) -> R,
{
    let mut test_conn = TestConnection::json();
    f(&mut test_conn.conn)
}

/// Runs a test with a temporary directory and a connection to it.
pub fn with_temp_dir<F, R>(f: F) -> R
where
    F: FnOnce(&TestDir, &mut Connection) -> R,
{
    let dir = TestDir::json();
    let mut conn = dir.open();
    f(&dir, &mut conn)
}

/// Test scenario helpers.
pub mod scenarios {
    use fsdb_core::{record, Connection, RecordId, Request};

    /// First names used by [`customers`].
    pub const FIRST_NAMES: [&str; 3] = ["Alice", "Bob", "Carol"];
    /// Cities used by [`customers`].
    pub const CITIES: [&str; 3] = ["Berlin", "London", "Sydney"];

    /// Inserts one customer per first name and city into `Customers`,
    /// `copies` times over. Returns the IDs in insertion order.
    pub fn customers(conn: &mut Connection, copies: usize) -> Vec<RecordId> {
        let mut ids = Vec::new();
        for _ in 0..copies {
            for first in FIRST_NAMES {
                for city in CITIES {
                    let res = conn
                        .exec(&Request::insert_into(
                            "Customers",
                            record! { "FirstName" => first, "City" => city },
                        ))
                        .expect("Failed to insert customer");
                    ids.push(res.last_insert_id.expect("Insert returned no ID"));
                }
            }
        }
        ids
    }

    /// Inserts `count` records `{"Index": i}` into a table.
    pub fn numbered(conn: &mut Connection, table: &str, count: usize) -> Vec<RecordId> {
        (0..count)
            .map(|i| {
                let index = i64::try_from(i).expect("Index out of range");
                conn.exec(&Request::insert_into(table, record! { "Index" => index }))
                    .expect("Failed to insert record")
                    .last_insert_id
                    .expect("Insert returned no ID")
            })
            .collect()
    }
}
