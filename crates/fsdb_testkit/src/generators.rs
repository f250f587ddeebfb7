//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use fsdb_codec::{Record, Value};
use fsdb_core::{Filter, Request, ID_FIELD};
use proptest::prelude::*;

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating field names. Never yields the reserved ID field.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for scalar values.
///
/// Floats are multiples of 1/8 so they survive any text round trip exactly.
pub fn scalar_strategy(with_null: bool) -> BoxedStrategy<Value> {
    let non_null = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1_000_000i32..1_000_000).prop_map(|n| Value::Float(f64::from(n) / 8.0)),
        "[ -~]{0,16}".prop_map(Value::Text),
    ];
    if with_null {
        prop_oneof![1 => Just(Value::Null), 8 => non_null].boxed()
    } else {
        non_null.boxed()
    }
}

/// Strategy for values of any shape, nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy(true).prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for values TOML can hold: no nulls anywhere, and lists of
/// scalars only.
pub fn toml_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        3 => scalar_strategy(false),
        1 => prop::collection::vec(scalar_strategy(false), 0..3).prop_map(Value::List),
    ];
    leaf.prop_recursive(2, 12, 3, |inner| {
        prop::collection::btree_map(field_name_strategy(), inner, 0..3).prop_map(Value::Map)
    })
}

/// Strategy for records of up to eight fields.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..8)
}

/// Strategy for records that survive a TOML table file unchanged.
pub fn toml_record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), toml_value_strategy(), 0..8)
}

/// Strategy for filters over a small field and value vocabulary, so that
/// generated filters actually match generated records some of the time.
pub fn filter_strategy() -> impl Strategy<Value = Filter> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "c"]),
        prop::collection::vec(small_value_strategy(), 1..3),
        0..3,
    )
    .prop_map(|fields| {
        fields
            .into_iter()
            .fold(Filter::new(), |f, (field, candidates)| f.any_of(field, candidates))
    })
}

/// Strategy for records over the same vocabulary as [`filter_strategy`].
pub fn small_record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "c"]).prop_map(String::from),
        small_value_strategy(),
        0..3,
    )
}

fn small_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..3).prop_map(Value::Integer),
        prop::sample::select(vec!["x", "y"]).prop_map(Value::from),
    ]
}

/// A table operation for model-based tests.
#[derive(Debug, Clone)]
pub enum TableOperation {
    /// Insert a record.
    Insert {
        /// Record to insert
        record: Record,
    },
    /// Update every record matching a filter.
    Update {
        /// Fields to assign
        set: Record,
        /// Which records to update
        filter: Filter,
    },
    /// Delete every record matching a filter.
    Delete {
        /// Which records to delete
        filter: Filter,
    },
    /// Select records matching a filter.
    Select {
        /// Which records to select
        filter: Filter,
    },
}

impl TableOperation {
    /// Builds the request for this operation against a table.
    #[must_use]
    pub fn to_request(&self, table: &str) -> Request {
        match self {
            Self::Insert { record } => Request::insert_into(table, record.clone()),
            Self::Update { set, filter } => {
                Request::update_where(table, set.clone(), filter.clone())
            }
            Self::Delete { filter } => Request::delete_from(table, filter.clone()),
            Self::Select { filter } => Request::select_from(table, filter.clone()),
        }
    }
}

/// Strategy for generating table operations.
pub fn table_operation_strategy() -> impl Strategy<Value = TableOperation> {
    prop_oneof![
        4 => small_record_strategy().prop_map(|record| TableOperation::Insert { record }),
        2 => (small_record_strategy(), filter_strategy())
            .prop_map(|(set, filter)| TableOperation::Update { set, filter }),
        1 => filter_strategy().prop_map(|filter| TableOperation::Delete { filter }),
        2 => filter_strategy().prop_map(|filter| TableOperation::Select { filter }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TableOperation>> {
    prop::collection::vec(table_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsdb_core::validate_table_name;

    fn has_null(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::List(items) => items.iter().any(has_null),
            Value::Map(entries) => entries.values().any(has_null),
            _ => false,
        }
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn table_name_is_valid(name in table_name_strategy()) {
            prop_assert!(validate_table_name(&name).is_ok());
        }

        #[test]
        fn records_never_hold_id_field(rec in record_strategy()) {
            prop_assert!(!rec.contains_key(ID_FIELD));
        }

        #[test]
        fn toml_records_have_no_nulls(rec in toml_record_strategy()) {
            prop_assert!(!rec.values().any(has_null));
        }

        #[test]
        fn filters_use_small_vocabulary(filter in filter_strategy()) {
            for (field, candidates) in filter.iter() {
                prop_assert!(["a", "b", "c"].contains(&field));
                prop_assert!(!candidates.is_empty());
            }
        }

        #[test]
        fn operations_build_requests(op in table_operation_strategy()) {
            let request = op.to_request("T");
            prop_assert_eq!(request.table(), "T");
            prop_assert_eq!(request.is_query(), matches!(op, TableOperation::Select { .. }));
        }
    }
}
