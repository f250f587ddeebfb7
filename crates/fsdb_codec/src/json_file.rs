//! JSON table files.

use crate::error::CodecResult;
use crate::format::TableFormat;
use crate::RecordSet;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Default extension for JSON table files.
pub const JSON_FILE_EXT: &str = ".jsondbt";

/// Human-readable JSON table files.
///
/// Files are pretty-printed with a one-space indent, so they stay easy to
/// inspect and diff by hand:
///
/// ```text
/// {
///  "1700000000000000000": {
///   "City": "Berlin",
///   "FirstName": "Alice"
///  }
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
    /// Creates a JSON format.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TableFormat for JsonFormat {
    fn file_extension(&self) -> &str {
        JSON_FILE_EXT
    }

    fn encode(&self, records: &RecordSet) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(128);
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        records.serialize(&mut ser)?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<RecordSet> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(RecordSet::new());
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecError, Record, Value};

    fn sample() -> RecordSet {
        let mut rec = Record::new();
        rec.insert("City".into(), Value::from("Berlin"));
        rec.insert("Age".into(), Value::from(41));
        rec.insert("Tags".into(), Value::from(vec!["a", "b"]));
        rec.insert("Note".into(), Value::Null);
        let mut set = RecordSet::new();
        set.insert("r1".into(), rec);
        set.insert("r2".into(), Record::new());
        set
    }

    #[test]
    fn encode_decode() {
        let format = JsonFormat::new();
        let set = sample();
        let bytes = format.encode(&set).unwrap();
        assert_eq!(format.decode(&bytes).unwrap(), set);
    }

    #[test]
    fn output_uses_single_space_indent() {
        let bytes = JsonFormat.encode(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\n \"r1\": {\n  \"Age\": 41,"));
    }

    #[test]
    fn empty_input_is_empty_table() {
        assert!(JsonFormat.decode(b"").unwrap().is_empty());
        assert!(JsonFormat.decode(b"  \n").unwrap().is_empty());
        assert!(JsonFormat.decode(b"{}").unwrap().is_empty());
    }

    #[test]
    fn non_mapping_rejected() {
        assert!(matches!(JsonFormat.decode(b"[1,2]"), Err(CodecError::Json(_))));
        assert!(matches!(
            JsonFormat.decode(br#"{"r1": 5}"#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn extension() {
        assert_eq!(JsonFormat.file_extension(), ".jsondbt");
    }
}
