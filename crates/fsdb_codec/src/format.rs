//! Table file format trait.

use crate::error::CodecResult;
use crate::RecordSet;

/// Encodes and decodes one table's full record set.
///
/// A format is an opaque byte transform: it knows nothing about tables,
/// directories, or transactions. The core reads a whole file, hands the
/// bytes to [`decode`](Self::decode), and writes back the output of
/// [`encode`](Self::encode) in full on every persist.
///
/// # Invariants
///
/// - `decode(encode(set))` yields a record set equal to `set`, minus any
///   values the format documents as unrepresentable
/// - an empty byte slice decodes to an empty record set
/// - implementations must be `Send + Sync` so one instance can serve every
///   connection a driver opens
///
/// # Implementors
///
/// - [`super::JsonFormat`]
/// - [`super::TomlFormat`]
pub trait TableFormat: Send + Sync {
    /// File name extension (including the leading dot) for table files.
    fn file_extension(&self) -> &str;

    /// Serializes a full record set.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in this format.
    fn encode(&self, records: &RecordSet) -> CodecResult<Vec<u8>>;

    /// Deserializes a full record set.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are malformed or do not describe a
    /// mapping of record IDs to records.
    fn decode(&self, bytes: &[u8]) -> CodecResult<RecordSet>;
}
