//! Filter sets and record matching.
//!
//! A filter maps field names to candidate values. A record matches when,
//! for every filtered field, at least one candidate equals the record's
//! value for that field: AND across fields, OR within a field.
//!
//! The reserved field [`ID_FIELD`] is matched against the record's ID,
//! which is stored beside the record rather than inside it.

use crate::error::{CoreError, CoreResult};
use fsdb_codec::{Record, Value};
use std::collections::BTreeMap;

/// Reserved field name for record IDs in filters and result columns.
///
/// Never stored as a field in a record.
pub const ID_FIELD: &str = "__id";

static NULL: Value = Value::Null;

/// A conjunction of per-field disjunctions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Vec<Value>>,
}

impl Filter {
    /// Creates an empty filter, which matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one candidate value for a field.
    #[must_use]
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Adds several candidate values for a field.
    #[must_use]
    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.fields
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Restricts matches to the given record IDs.
    #[must_use]
    pub fn ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.any_of(ID_FIELD, ids.into_iter().map(|id| Value::Text(id.into())))
    }

    /// Builds a filter from a `where` value.
    ///
    /// `null` is the empty filter. Otherwise the value must be a map; a list
    /// entry supplies several candidates, any other entry exactly one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the value is neither null nor a map.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Map(entries) => {
                let fields = entries
                    .into_iter()
                    .map(|(field, v)| match v {
                        Value::List(candidates) => (field, candidates),
                        single => (field, vec![single]),
                    })
                    .collect();
                Ok(Self { fields })
            }
            other => Err(CoreError::invalid_request(format!(
                "'where' must be a map, got {}",
                other.kind()
            ))),
        }
    }

    /// Renders the filter as a `where` value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|(field, candidates)| (field.clone(), Value::List(candidates.clone())))
                .collect(),
        )
    }

    /// Returns true if no field is filtered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the candidates for a field, if it is filtered.
    #[must_use]
    pub fn candidates(&self, field: &str) -> Option<&[Value]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Iterates over filtered fields and their candidates.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields.iter().map(|(f, c)| (f.as_str(), c.as_slice()))
    }

    /// Evaluates the filter against one record. See [`matches`].
    #[must_use]
    pub fn matches(&self, record_id: &str, record: &Record, loose: bool) -> bool {
        matches(record_id, record, self, loose)
    }
}

/// Returns whether a record satisfies a filter.
///
/// - `record_id`: the record's ID, or `""` when there is no ID context; an
///   `__id` filter is then skipped rather than failed
/// - `loose`: also treat values as equal when their string renderings are
///   equal, so `"3"` matches `3`
///
/// A field missing from the record compares as `null`.
#[must_use]
pub fn matches(record_id: &str, record: &Record, filter: &Filter, loose: bool) -> bool {
    filter.iter().all(|(field, candidates)| {
        if field == ID_FIELD {
            record_id.is_empty() || candidates.iter().any(|c| id_equals(record_id, c, loose))
        } else {
            let actual = record.get(field).unwrap_or(&NULL);
            candidates.iter().any(|c| value_equals(actual, c, loose))
        }
    })
}

fn value_equals(actual: &Value, candidate: &Value, loose: bool) -> bool {
    actual == candidate || (loose && actual.to_string() == candidate.to_string())
}

fn id_equals(record_id: &str, candidate: &Value, loose: bool) -> bool {
    match candidate {
        Value::Text(s) => s == record_id,
        other => loose && other.to_string() == record_id,
    }
}

/// The record ID a candidate names, when used for direct lookup.
pub(crate) fn candidate_id(candidate: &Value, loose: bool) -> Option<String> {
    match candidate {
        Value::Text(s) => Some(s.clone()),
        other if loose => Some(other.to_string()),
        _ => None,
    }
}
