//! Tables command implementation.

use super::{connect, OutputFormat, StoreFormat};
use serde::Serialize;
use std::path::Path;

/// One table in the directory.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Number of records.
    pub records: usize,
}

/// Runs the tables command.
pub fn run(
    dir: &Path,
    format: StoreFormat,
    output: OutputFormat,
) -> Result<Vec<TableInfo>, Box<dyn std::error::Error>> {
    let mut conn = connect(dir, format)?;
    let mut tables = Vec::new();
    for name in conn.table_names()? {
        let records = conn.count(&name)?;
        tables.push(TableInfo { name, records });
    }
    conn.close()?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
        OutputFormat::Text => {
            println!("Directory: {}", dir.display());
            for table in &tables {
                println!("  {:<24} {:>8} records", table.name, table.records);
            }
            println!("{} tables", tables.len());
        }
    }
    Ok(tables)
}
