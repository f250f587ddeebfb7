//! Driver configuration.

/// How new record IDs are chosen on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// Nanoseconds since the Unix epoch, bumped so IDs issued by one table
    /// are strictly increasing.
    #[default]
    Timestamp,
    /// The table's current record count. Compact, but reuses a number once
    /// records have been deleted, which then fails the insert with a
    /// duplicate ID error.
    Sequential,
}

/// Configuration for a [`Driver`](crate::Driver) and the connections it opens.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether connections to the same directory share one set of tables.
    pub connection_caching: bool,

    /// Whether filter matching also compares the string renderings of values.
    pub loose_compare: bool,

    /// Whether to create the connection directory if it doesn't exist.
    pub create_if_missing: bool,

    /// How record IDs are assigned.
    pub id_strategy: IdStrategy,

    /// Table file extension, overriding the format's default.
    pub file_extension: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_caching: false,
            loose_compare: false,
            create_if_missing: true,
            id_strategy: IdStrategy::Timestamp,
            file_extension: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether connections to the same directory share tables.
    #[must_use]
    pub const fn connection_caching(mut self, value: bool) -> Self {
        self.connection_caching = value;
        self
    }

    /// Sets whether filters compare string renderings as a fallback.
    #[must_use]
    pub const fn loose_compare(mut self, value: bool) -> Self {
        self.loose_compare = value;
        self
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the record ID strategy.
    #[must_use]
    pub const fn id_strategy(mut self, value: IdStrategy) -> Self {
        self.id_strategy = value;
        self
    }

    /// Overrides the table file extension.
    #[must_use]
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = Some(ext.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.connection_caching);
        assert!(!config.loose_compare);
        assert!(config.create_if_missing);
        assert_eq!(config.id_strategy, IdStrategy::Timestamp);
        assert!(config.file_extension.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .connection_caching(true)
            .loose_compare(true)
            .id_strategy(IdStrategy::Sequential)
            .file_extension(".tbl");

        assert!(config.connection_caching);
        assert!(config.loose_compare);
        assert_eq!(config.id_strategy, IdStrategy::Sequential);
        assert_eq!(config.file_extension.as_deref(), Some(".tbl"));
    }
}
