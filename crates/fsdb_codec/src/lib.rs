//! # fsdb Codec
//!
//! Record values and table file formats for fsdb.
//!
//! A table is stored as one file holding its complete record set: a mapping
//! from record ID to record, where a record maps field names to [`Value`]s.
//! This crate defines those types and the [`TableFormat`] capability pair
//! that turns a record set into bytes and back.
//!
//! ## Available Formats
//!
//! - [`JsonFormat`] - pretty-printed JSON (`.jsondbt`)
//! - [`TomlFormat`] - one TOML table per record (`.tomldbt`)
//!
//! ## Usage
//!
//! ```
//! use fsdb_codec::{record, JsonFormat, RecordSet, TableFormat, Value};
//!
//! let mut set = RecordSet::new();
//! set.insert("0".to_string(), record! { "Name" => "Kettle", "Stock" => 4 });
//!
//! let bytes = JsonFormat.encode(&set).unwrap();
//! let decoded = JsonFormat.decode(&bytes).unwrap();
//! assert_eq!(decoded["0"]["Stock"], Value::Integer(4));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod format;
mod json_file;
mod toml_file;
mod value;

use std::collections::BTreeMap;

pub use error::{CodecError, CodecResult};
pub use format::TableFormat;
pub use json_file::{JsonFormat, JSON_FILE_EXT};
pub use toml_file::{TomlFormat, TOML_FILE_EXT};
pub use value::Value;

/// Identifier of a record, unique within its table.
pub type RecordId = String;

/// One stored item: field name to value. Never holds its own ID.
pub type Record = BTreeMap<String, Value>;

/// A table's full contents, as read from or written to its file.
pub type RecordSet = BTreeMap<RecordId, Record>;

/// Builds a [`Record`] from `field => value` pairs.
///
/// ```
/// use fsdb_codec::{record, Value};
///
/// let rec = record! { "City" => "Berlin", "Visits" => 3 };
/// assert_eq!(rec["Visits"], Value::Integer(3));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut rec = $crate::Record::new();
        $(
            rec.insert(::std::string::String::from($field), $crate::Value::from($value));
        )+
        rec
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_macro() {
        let rec = record! { "a" => 1, "b" => "two", "c" => true };
        assert_eq!(rec.len(), 3);
        assert_eq!(rec["b"], Value::from("two"));
        assert!(record! {}.is_empty());
    }

    #[test]
    fn formats_agree_on_plain_records() {
        let mut set = RecordSet::new();
        set.insert("7".into(), record! { "Kind" => "Toaster", "Price" => 19.5 });

        let from_json = JsonFormat.decode(&JsonFormat.encode(&set).unwrap()).unwrap();
        let from_toml = TomlFormat.decode(&TomlFormat.encode(&set).unwrap()).unwrap();
        assert_eq!(from_json, from_toml);
    }
}
