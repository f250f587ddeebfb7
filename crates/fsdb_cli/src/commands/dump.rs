//! Dump command implementation.

use super::{connect, OutputFormat, StoreFormat};
use fsdb_core::{CoreError, Filter, RecordSet};
use std::path::Path;

/// Runs the dump command.
pub fn run(
    dir: &Path,
    format: StoreFormat,
    table: &str,
    output: OutputFormat,
) -> Result<RecordSet, Box<dyn std::error::Error>> {
    let mut conn = connect(dir, format)?;
    if !conn.table_names()?.iter().any(|t| t == table) {
        return Err(CoreError::table_not_found(table).into());
    }
    let records = conn.fetch(table, &Filter::new())?;
    conn.close()?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            for (id, record) in &records {
                println!("{id}");
                for (field, value) in record {
                    println!("  {field} = {value}");
                }
            }
            println!("({} records)", records.len());
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsdb_core::{record, Request, Value};
    use tempfile::tempdir;

    #[test]
    fn dump_returns_all_records() {
        let temp = tempdir().unwrap();
        let mut conn = connect(temp.path(), StoreFormat::Json).unwrap();
        let id = conn
            .exec(&Request::insert_into("T", record! { "a" => Value::Null, "b" => 2 }))
            .unwrap()
            .last_insert_id
            .unwrap();
        conn.close().unwrap();

        let records = run(temp.path(), StoreFormat::Json, "T", OutputFormat::Text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[&id], record! { "a" => Value::Null, "b" => 2 });
    }

    #[test]
    fn dump_unknown_table_fails() {
        let temp = tempdir().unwrap();
        assert!(run(temp.path(), StoreFormat::Json, "Nope", OutputFormat::Json).is_err());
        assert!(!temp.path().join("Nope.jsondbt").exists());
    }
}
