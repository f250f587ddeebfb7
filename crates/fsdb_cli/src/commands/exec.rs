//! Exec command implementation.

use super::{connect, StoreFormat};
use fsdb_core::ExecResult;
use std::path::Path;

/// Runs the exec command.
pub fn run(
    dir: &Path,
    format: StoreFormat,
    statement: &str,
) -> Result<ExecResult, Box<dyn std::error::Error>> {
    let mut conn = connect(dir, format)?;
    let result = conn.execute(statement)?;
    conn.close()?;

    println!("Affected rows: {}", result.affected_rows);
    if let Some(id) = &result.last_insert_id {
        println!("Last insert ID: {id}");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exec_writes_through() {
        let temp = tempdir().unwrap();
        run(temp.path(), StoreFormat::Json, r#""createTable": "T""#).unwrap();
        let res = run(
            temp.path(),
            StoreFormat::Json,
            r#""insertInto": "T", "set": {"a": 1}"#,
        )
        .unwrap();
        assert_eq!(res.affected_rows, 1);
        assert!(res.last_insert_id.is_some());

        let mut conn = connect(temp.path(), StoreFormat::Json).unwrap();
        assert_eq!(conn.count("T").unwrap(), 1);
    }

    #[test]
    fn exec_rejects_select() {
        let temp = tempdir().unwrap();
        assert!(run(temp.path(), StoreFormat::Json, r#""selectFrom": "T""#).is_err());
    }
}
