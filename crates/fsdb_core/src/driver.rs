//! Connection factory.
//!
//! A [`Driver`] pairs a [`TableFormat`] with a [`Config`] and opens
//! connections to table directories. With connection caching enabled, it
//! remembers one registry per directory and hands it to every connection
//! opened there, so they all see the same tables.

use crate::config::Config;
use crate::connection::{Connection, RegistryHandle};
use crate::dir::TableDir;
use crate::error::CoreResult;
use crate::registry::TableRegistry;
use crate::stats::StoreStats;
use crate::table::TableContext;
use fsdb_codec::{JsonFormat, TableFormat, TomlFormat};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type SharedRegistry = Arc<Mutex<TableRegistry>>;

/// Opens connections using one table format and configuration.
pub struct Driver {
    format: Arc<dyn TableFormat>,
    config: Config,
    extension: String,
    /// Shared registries by canonical directory path.
    cache: Mutex<HashMap<PathBuf, SharedRegistry>>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("extension", &self.extension)
            .field("config", &self.config)
            .field("cached_dirs", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Creates a driver for the given format.
    pub fn new(format: Arc<dyn TableFormat>, config: Config) -> Self {
        let extension = config
            .file_extension
            .clone()
            .unwrap_or_else(|| format.file_extension().to_string());
        Self {
            format,
            config,
            extension,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a driver storing tables as JSON.
    pub fn json(config: Config) -> Self {
        Self::new(Arc::new(JsonFormat::new()), config)
    }

    /// Creates a driver storing tables as TOML.
    pub fn toml(config: Config) -> Self {
        Self::new(Arc::new(TomlFormat::new()), config)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the table file extension in use.
    #[must_use]
    pub fn file_extension(&self) -> &str {
        &self.extension
    }

    /// Returns whether connections to one directory share their tables.
    #[must_use]
    pub fn connection_caching(&self) -> bool {
        self.config.connection_caching
    }

    /// Opens a connection to a directory, loading every table file in it.
    ///
    /// With connection caching, the first open of a directory loads it and
    /// later opens reuse those tables.
    ///
    /// # Errors
    ///
    /// Fails if the directory can't be opened or created, or if any table
    /// file fails to load.
    pub fn open(&self, dir: impl AsRef<Path>) -> CoreResult<Connection> {
        let table_dir = TableDir::open(
            dir.as_ref(),
            self.extension.clone(),
            self.config.create_if_missing,
        )?;
        let path = table_dir.path().to_path_buf();

        if !self.config.connection_caching {
            let registry = self.load(table_dir)?;
            let stats = Arc::clone(registry.stats());
            return Ok(Connection::new(
                path,
                RegistryHandle::Private(registry),
                stats,
            ));
        }

        let key = path.canonicalize()?;
        let mut cache = self.cache.lock();
        let shared = match cache.get(&key) {
            Some(shared) => {
                debug!(dir = %key.display(), "reusing cached tables");
                Arc::clone(shared)
            }
            None => {
                let shared = Arc::new(Mutex::new(self.load(table_dir)?));
                cache.insert(key, Arc::clone(&shared));
                shared
            }
        };
        let stats = Arc::clone(shared.lock().stats());
        Ok(Connection::new(path, RegistryHandle::Shared(shared), stats))
    }

    /// Forgets the cached tables of a directory, if any.
    ///
    /// Open connections keep using them; the next open reloads from disk.
    pub fn evict(&self, dir: impl AsRef<Path>) -> bool {
        let Ok(key) = dir.as_ref().canonicalize() else {
            return false;
        };
        self.cache.lock().remove(&key).is_some()
    }

    fn load(&self, dir: TableDir) -> CoreResult<TableRegistry> {
        let ctx = TableContext {
            format: Arc::clone(&self.format),
            stats: Arc::new(StoreStats::new()),
            id_strategy: self.config.id_strategy,
            loose_compare: self.config.loose_compare,
        };
        let mut registry = TableRegistry::new(dir, ctx);
        registry.init()?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoreError, Filter, Request};
    use fsdb_codec::record;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("db");
        let conn = Driver::json(Config::default()).open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(conn.dir(), dir);
        assert!(!conn.is_shared());
    }

    #[test]
    fn open_without_create_fails() {
        let temp = tempdir().unwrap();
        let driver = Driver::json(Config::new().create_if_missing(false));
        assert!(matches!(
            driver.open(temp.path().join("missing")),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn open_fails_on_corrupt_table() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("Bad.jsondbt"), b"{").unwrap();
        assert!(Driver::json(Config::default()).open(temp.path()).is_err());
    }

    #[test]
    fn extension_follows_format_or_override() {
        assert_eq!(Driver::json(Config::default()).file_extension(), ".jsondbt");
        assert_eq!(Driver::toml(Config::default()).file_extension(), ".tomldbt");
        let custom = Driver::json(Config::new().file_extension(".tbl"));
        assert_eq!(custom.file_extension(), ".tbl");
    }

    #[test]
    fn private_connections_are_independent() {
        let temp = tempdir().unwrap();
        let driver = Driver::json(Config::default());
        let mut a = driver.open(temp.path()).unwrap();
        let mut b = driver.open(temp.path()).unwrap();

        a.begin().unwrap();
        a.exec(&Request::insert_into("T", record! { "n" => 1 }))
            .unwrap();
        assert_eq!(a.count("T").unwrap(), 1);
        assert_eq!(b.count("T").unwrap(), 0);

        a.commit().unwrap();
        b.reload_all(None).unwrap();
        assert_eq!(b.count("T").unwrap(), 1);
    }

    #[test]
    fn cached_connections_share_tables() {
        let temp = tempdir().unwrap();
        let driver = Driver::json(Config::new().connection_caching(true));
        let mut a = driver.open(temp.path()).unwrap();
        let mut b = driver.open(temp.path()).unwrap();
        assert!(a.is_shared());

        a.begin().unwrap();
        let id = a
            .exec(&Request::insert_into("T", record! { "n" => 1 }))
            .unwrap()
            .last_insert_id
            .unwrap();

        // Uncommitted, but the in-memory table is the same one.
        let seen = b
            .query(&Request::select_from("T", Filter::new().ids([id])))
            .unwrap()
            .count();
        assert_eq!(seen, 1);
        assert!(!b.in_transaction());

        a.commit().unwrap();
        b.close().unwrap();

        let mut c = driver.open(temp.path()).unwrap();
        assert_eq!(c.count("T").unwrap(), 1);
        assert_eq!(c.stats(), a.stats());
    }

    #[test]
    fn cached_connections_share_the_open_transaction() {
        let temp = tempdir().unwrap();
        let driver = Driver::json(Config::new().connection_caching(true));
        let mut a = driver.open(temp.path()).unwrap();
        let mut b = driver.open(temp.path()).unwrap();
        a.exec(&Request::insert_into("T", record! { "who" => "seed" }))
            .unwrap();
        let on_disk = || {
            let bytes = fs::read(temp.path().join("T.jsondbt")).unwrap();
            JsonFormat.decode(&bytes).unwrap()
        };

        a.begin().unwrap();
        a.exec(&Request::insert_into("T", record! { "who" => "a-uncommitted" }))
            .unwrap();
        b.exec(&Request::insert_into("T", record! { "who" => "b" }))
            .unwrap();
        assert_eq!(on_disk().len(), 1);
        assert!(matches!(b.begin(), Err(CoreError::TransactionActive)));
        assert!(b.commit().is_err());

        a.rollback().unwrap();
        let leaked = b
            .fetch("T", &Filter::new().equals("who", "a-uncommitted"))
            .unwrap();
        assert!(leaked.is_empty());
        assert_eq!(a.count("T").unwrap(), 1);
        assert_eq!(on_disk().len(), 1);
        b.begin().unwrap();
    }

    #[test]
    fn evict_forgets_cached_tables() {
        let temp = tempdir().unwrap();
        let driver = Driver::json(Config::new().connection_caching(true));
        let mut a = driver.open(temp.path()).unwrap();
        a.exec(&Request::create_table("T")).unwrap();

        assert!(driver.evict(temp.path()));
        assert!(!driver.evict(temp.path()));

        let b = driver.open(temp.path()).unwrap();
        assert_ne!(a.stats(), b.stats());
    }

    #[test]
    fn shared_connections_across_threads() {
        let temp = tempdir().unwrap();
        let driver = Arc::new(Driver::json(Config::new().connection_caching(true)));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let driver = Arc::clone(&driver);
                let path = temp.path().to_path_buf();
                std::thread::spawn(move || {
                    let mut conn = driver.open(&path).unwrap();
                    for i in 0..25 {
                        conn.exec(&Request::insert_into(
                            "T",
                            record! { "thread" => t, "i" => i },
                        ))
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut conn = driver.open(temp.path()).unwrap();
        assert_eq!(conn.count("T").unwrap(), 100);
        let mut fresh = Driver::json(Config::default()).open(temp.path()).unwrap();
        assert_eq!(fresh.count("T").unwrap(), 100);
    }
}
