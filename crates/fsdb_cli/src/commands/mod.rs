//! CLI command implementations.

pub mod demo;
pub mod dump;
pub mod exec;
pub mod query;
pub mod tables;

use clap::ValueEnum;
use fsdb_core::{Config, Connection, CoreResult, Driver};
use std::path::Path;

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreFormat {
    /// `.jsondbt` files
    Json,
    /// `.tomldbt` files
    Toml,
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Opens a private connection to a directory.
pub fn connect(dir: &Path, format: StoreFormat) -> CoreResult<Connection> {
    let config = Config::default();
    let driver = match format {
        StoreFormat::Json => Driver::json(config),
        StoreFormat::Toml => Driver::toml(config),
    };
    driver.open(dir)
}
