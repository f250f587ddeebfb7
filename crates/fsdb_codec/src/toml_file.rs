//! TOML table files.

use crate::error::{CodecError, CodecResult};
use crate::format::TableFormat;
use crate::{Record, RecordSet, Value};
use std::collections::BTreeMap;

/// Default extension for TOML table files.
pub const TOML_FILE_EXT: &str = ".tomldbt";

/// TOML table files: one `[<record-id>]` table per record.
///
/// TOML has no null. Null record fields are left out when writing and so
/// read back as absent; a null inside a list cannot be written at all and
/// fails the encode. TOML datetimes are read as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFormat;

impl TomlFormat {
    /// Creates a TOML format.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TableFormat for TomlFormat {
    fn file_extension(&self) -> &str {
        TOML_FILE_EXT
    }

    fn encode(&self, records: &RecordSet) -> CodecResult<Vec<u8>> {
        let mut root = toml::Table::new();
        for (id, record) in records {
            root.insert(id.clone(), toml::Value::Table(table_to_toml(record)?));
        }
        Ok(toml::to_string(&root)?.into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<RecordSet> {
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        let root: toml::Table = toml::from_str(text)?;

        let mut records = RecordSet::new();
        for (id, entry) in root {
            match entry {
                toml::Value::Table(fields) => {
                    records.insert(id, table_from_toml(fields));
                }
                other => {
                    return Err(CodecError::invalid_shape(format!(
                        "record '{id}' is a {}, expected a table",
                        other.type_str()
                    )));
                }
            }
        }
        Ok(records)
    }
}

fn table_to_toml(fields: &BTreeMap<String, Value>) -> CodecResult<toml::Table> {
    let mut table = toml::Table::new();
    for (name, value) in fields {
        if let Some(v) = value_to_toml(value)? {
            table.insert(name.clone(), v);
        }
    }
    Ok(table)
}

/// Returns `None` for null, which TOML cannot express.
fn value_to_toml(value: &Value) -> CodecResult<Option<toml::Value>> {
    Ok(Some(match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Integer(n) => toml::Value::Integer(*n),
        Value::Float(x) => toml::Value::Float(*x),
        Value::Text(s) => toml::Value::String(s.clone()),
        Value::List(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                match value_to_toml(item)? {
                    Some(v) => array.push(v),
                    None => {
                        return Err(CodecError::unsupported("null list element in TOML"));
                    }
                }
            }
            toml::Value::Array(array)
        }
        Value::Map(entries) => toml::Value::Table(table_to_toml(entries)?),
    }))
}

fn table_from_toml(table: toml::Table) -> Record {
    table
        .into_iter()
        .map(|(k, v)| (k, value_from_toml(v)))
        .collect()
}

fn value_from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Text(s),
        toml::Value::Integer(n) => Value::Integer(n),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::Text(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(value_from_toml).collect()),
        toml::Value::Table(t) => Value::Map(table_from_toml(t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(first: &str, city: &str) -> Record {
        let mut rec = Record::new();
        rec.insert("FirstName".into(), Value::from(first));
        rec.insert("City".into(), Value::from(city));
        rec.insert("Visits".into(), Value::from(3));
        rec.insert("Tags".into(), Value::from(vec!["vip", "new"]));
        rec
    }

    #[test]
    fn encode_decode() {
        let mut set = RecordSet::new();
        set.insert("0".into(), customer("Alice", "Berlin"));
        set.insert("1".into(), customer("Bob", "Sydney"));

        let bytes = TomlFormat.encode(&set).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("[0]"));
        assert!(text.contains("City = \"Berlin\""));

        assert_eq!(TomlFormat.decode(&bytes).unwrap(), set);
    }

    #[test]
    fn nested_map_survives() {
        let mut address = BTreeMap::new();
        address.insert("Street".to_string(), Value::from("Main"));
        let mut rec = customer("Alice", "Berlin");
        rec.insert("Address".into(), Value::Map(address));
        let mut set = RecordSet::new();
        set.insert("r".into(), rec);

        let bytes = TomlFormat.encode(&set).unwrap();
        assert_eq!(TomlFormat.decode(&bytes).unwrap(), set);
    }

    #[test]
    fn null_fields_are_dropped() {
        let mut rec = customer("Alice", "Berlin");
        rec.insert("Note".into(), Value::Null);
        let mut set = RecordSet::new();
        set.insert("r".into(), rec);

        let decoded = TomlFormat.decode(&TomlFormat.encode(&set).unwrap()).unwrap();
        assert!(!decoded["r"].contains_key("Note"));
        assert_eq!(decoded["r"]["City"], Value::from("Berlin"));
    }

    #[test]
    fn null_in_list_rejected() {
        let mut rec = Record::new();
        rec.insert("L".into(), Value::List(vec![Value::Null]));
        let mut set = RecordSet::new();
        set.insert("r".into(), rec);

        assert!(matches!(
            TomlFormat.encode(&set),
            Err(CodecError::Unsupported { .. })
        ));
    }

    #[test]
    fn top_level_scalar_rejected() {
        let result = TomlFormat.decode(b"r1 = 5\n");
        assert!(matches!(result, Err(CodecError::InvalidShape { .. })));
    }

    #[test]
    fn empty_input_is_empty_table() {
        assert!(TomlFormat.decode(b"").unwrap().is_empty());
    }

    #[test]
    fn datetime_reads_as_text() {
        let decoded = TomlFormat
            .decode(b"[r1]\nAt = 1979-05-27T07:32:00Z\n")
            .unwrap();
        assert_eq!(decoded["r1"]["At"], Value::from("1979-05-27T07:32:00Z"));
    }
}
