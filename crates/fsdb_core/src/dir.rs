//! Connection directory management.
//!
//! A connection directory holds one file per table:
//!
//! ```text
//! <dir>/
//! ├─ Customers.jsondbt
//! ├─ Orders.jsondbt
//! └─ Products.jsondbt
//! ```
//!
//! Table files are always rewritten in full. Writes go to a sibling
//! `<file>.tmp` that is then renamed over the table file, so a reader never
//! sees a half-written table. No file locks are taken.

use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Suffix appended to a table file's name while it is being rewritten.
const TEMP_SUFFIX: &str = ".tmp";

/// A directory of table files with a common extension.
#[derive(Debug, Clone)]
pub struct TableDir {
    /// Root directory path.
    path: PathBuf,
    /// Table file extension, including the leading dot.
    extension: String,
}

impl TableDir {
    /// Opens a table directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the directory
    /// * `extension` - Table file extension (e.g. `.jsondbt`)
    /// * `create_if_missing` - If true, creates the directory if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory
    /// - I/O errors occur
    pub fn open(
        path: &Path,
        extension: impl Into<String>,
        create_if_missing: bool,
    ) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            extension: extension.into(),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the table file extension.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns the file path backing the named table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTableName` if the name cannot be used as a file name.
    pub fn table_path(&self, name: &str) -> CoreResult<PathBuf> {
        validate_table_name(name)?;
        Ok(self.path.join(format!("{name}{}", self.extension)))
    }

    /// Returns whether the named table has a file.
    #[must_use]
    pub fn has_table_file(&self, name: &str) -> bool {
        self.table_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Lists the names of all tables that have a file, sorted.
    ///
    /// Only regular files directly inside the directory whose names end in
    /// the table extension count. The match is case-sensitive.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(self.extension.as_str()) {
                if !stem.is_empty() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes the named table's file.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if there is no such file.
    pub fn remove_table_file(&self, name: &str) -> CoreResult<()> {
        let path = self.table_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CoreError::table_not_found(name)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Rejects names that would escape the directory or produce odd file names.
pub fn validate_table_name(name: &str) -> CoreResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(CoreError::InvalidTableName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Returns the modification time of a file, or `None` if it doesn't exist.
pub(crate) fn modified_time(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reads a whole file, or returns `None` if it doesn't exist.
pub(crate) fn read_file(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces a file's contents using write-then-rename.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let dir = TableDir::open(&path, ".jsondbt", true).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
        assert_eq!(dir.extension(), ".jsondbt");
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = TableDir::open(&temp.path().join("missing"), ".jsondbt", false);
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn open_fails_on_plain_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(TableDir::open(&file, ".jsondbt", true).is_err());
    }

    #[test]
    fn table_names_filter_by_extension() {
        let temp = tempdir().unwrap();
        let dir = TableDir::open(temp.path(), ".jsondbt", true).unwrap();

        fs::write(temp.path().join("Orders.jsondbt"), b"{}").unwrap();
        fs::write(temp.path().join("Customers.jsondbt"), b"{}").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(temp.path().join("Upper.JSONDBT"), b"{}").unwrap();
        fs::write(temp.path().join("Orders.jsondbt.tmp"), b"{}").unwrap();
        fs::create_dir(temp.path().join("Nested.jsondbt")).unwrap();

        assert_eq!(dir.table_names().unwrap(), vec!["Customers", "Orders"]);
    }

    #[test]
    fn table_path_rejects_bad_names() {
        let temp = tempdir().unwrap();
        let dir = TableDir::open(temp.path(), ".jsondbt", true).unwrap();

        assert_eq!(
            dir.table_path("Orders").unwrap(),
            temp.path().join("Orders.jsondbt")
        );
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(dir.table_path(bad), Err(CoreError::InvalidTableName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("t.jsondbt");

        assert!(read_file(&path).unwrap().is_none());
        assert!(modified_time(&path).unwrap().is_none());

        write_file(&path, b"{\"a\": {}}").unwrap();
        assert_eq!(read_file(&path).unwrap().unwrap(), b"{\"a\": {}}");
        assert!(modified_time(&path).unwrap().is_some());
        assert!(!temp.path().join("t.jsondbt.tmp").exists());

        write_file(&path, b"{}").unwrap();
        assert_eq!(read_file(&path).unwrap().unwrap(), b"{}");
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        let temp = tempdir().unwrap();
        let dir = TableDir::open(temp.path(), ".jsondbt", true).unwrap();

        fs::write(temp.path().join("T.jsondbt"), b"{}").unwrap();
        assert!(dir.has_table_file("T"));
        dir.remove_table_file("T").unwrap();
        assert!(!dir.has_table_file("T"));

        assert!(matches!(
            dir.remove_table_file("T"),
            Err(CoreError::TableNotFound { .. })
        ));
    }
}
