//! Query command implementation.

use super::{connect, OutputFormat, StoreFormat};
use fsdb_core::{Rows, Value};
use serde::Serialize;
use std::path::Path;

/// Rows returned by a select.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Column names, ID column first.
    pub columns: Vec<String>,
    /// One value per column for each row.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Drains a cursor.
    pub fn from_rows(rows: Rows) -> Self {
        let columns = rows.columns().to_vec();
        let rows = rows.map(fsdb_core::Row::into_values).collect();
        Self { columns, rows }
    }
}

/// Runs the query command.
pub fn run(
    dir: &Path,
    format: StoreFormat,
    statement: &str,
    output: OutputFormat,
) -> Result<QueryResult, Box<dyn std::error::Error>> {
    let mut conn = connect(dir, format)?;
    let result = QueryResult::from_rows(conn.query_str(statement)?);
    conn.close()?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(result)
}

fn print_text_output(result: &QueryResult) {
    println!("{}", result.columns.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(Value::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows)", result.rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsdb_core::{record, Request};
    use tempfile::tempdir;

    #[test]
    fn query_collects_rows() {
        let temp = tempdir().unwrap();
        let mut conn = connect(temp.path(), StoreFormat::Toml).unwrap();
        conn.exec(&Request::insert_into("T", record! { "a" => 1, "b" => "x" }))
            .unwrap();
        conn.exec(&Request::insert_into("T", record! { "a" => 2 }))
            .unwrap();
        conn.close().unwrap();

        let result = run(
            temp.path(),
            StoreFormat::Toml,
            r#""selectFrom": "T", "where": {"a": 1}"#,
            OutputFormat::Json,
        )
        .unwrap();
        assert_eq!(result.columns, ["__id", "a", "b"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][2], Value::from("x"));
    }
}
