//! Structured requests and their JSON statement form.
//!
//! A statement is a JSON object with exactly one command key naming the
//! table, plus optional `set` and `where` keys:
//!
//! ```text
//! {"createTable": "Orders"}
//! {"insertInto": "Orders", "set": {"Product": "Kettle", "Qty": 2}}
//! {"selectFrom": "Orders", "where": {"Qty": [1, 2]}}
//! {"updateWhere": "Orders", "set": {"Qty": 3}, "where": {"__id": "17"}}
//! {"deleteFrom": "Orders", "where": {"Product": "Kettle"}}
//! {"dropTable": "Orders"}
//! ```
//!
//! The outer braces may be left off.

use crate::error::{CoreError, CoreResult};
use crate::filter::{Filter, ID_FIELD};
use fsdb_codec::{CodecError, Record, Value};
use std::collections::BTreeMap;

const CREATE_TABLE: &str = "createTable";
const DROP_TABLE: &str = "dropTable";
const INSERT_INTO: &str = "insertInto";
const SELECT_FROM: &str = "selectFrom";
const UPDATE_WHERE: &str = "updateWhere";
const DELETE_FROM: &str = "deleteFrom";

const SET_KEY: &str = "set";
const WHERE_KEY: &str = "where";

const COMMANDS: [&str; 6] = [
    CREATE_TABLE,
    DROP_TABLE,
    INSERT_INTO,
    SELECT_FROM,
    UPDATE_WHERE,
    DELETE_FROM,
];

/// One command against a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Creates an empty table.
    CreateTable {
        /// Table name.
        name: String,
    },
    /// Unregisters a table and deletes its file.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Inserts one record.
    InsertInto {
        /// Table name.
        name: String,
        /// The record to store.
        record: Record,
    },
    /// Returns matching records.
    SelectFrom {
        /// Table name.
        name: String,
        /// Which records to return.
        filter: Filter,
    },
    /// Assigns fields on matching records.
    UpdateWhere {
        /// Table name.
        name: String,
        /// Field assignments.
        set: Record,
        /// Which records to change.
        filter: Filter,
    },
    /// Removes matching records.
    DeleteFrom {
        /// Table name.
        name: String,
        /// Which records to remove.
        filter: Filter,
    },
}

impl Request {
    /// Builds a create-table request.
    pub fn create_table(name: impl Into<String>) -> Self {
        Self::CreateTable { name: name.into() }
    }

    /// Builds a drop-table request.
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Builds an insert request.
    pub fn insert_into(name: impl Into<String>, record: Record) -> Self {
        Self::InsertInto {
            name: name.into(),
            record,
        }
    }

    /// Builds a select request.
    pub fn select_from(name: impl Into<String>, filter: Filter) -> Self {
        Self::SelectFrom {
            name: name.into(),
            filter,
        }
    }

    /// Builds an update request.
    pub fn update_where(name: impl Into<String>, set: Record, filter: Filter) -> Self {
        Self::UpdateWhere {
            name: name.into(),
            set,
            filter,
        }
    }

    /// Builds a delete request.
    pub fn delete_from(name: impl Into<String>, filter: Filter) -> Self {
        Self::DeleteFrom {
            name: name.into(),
            filter,
        }
    }

    /// Returns the command key, e.g. `"selectFrom"`.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => CREATE_TABLE,
            Self::DropTable { .. } => DROP_TABLE,
            Self::InsertInto { .. } => INSERT_INTO,
            Self::SelectFrom { .. } => SELECT_FROM,
            Self::UpdateWhere { .. } => UPDATE_WHERE,
            Self::DeleteFrom { .. } => DELETE_FROM,
        }
    }

    /// Returns the table the request targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { name }
            | Self::DropTable { name }
            | Self::InsertInto { name, .. }
            | Self::SelectFrom { name, .. }
            | Self::UpdateWhere { name, .. }
            | Self::DeleteFrom { name, .. } => name,
        }
    }

    /// Returns true for requests that only read.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::SelectFrom { .. })
    }

    /// Parses a statement.
    ///
    /// Text that doesn't open with `{` is wrapped in braces; text that opens
    /// with one but doesn't close gets the closing brace.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the text is not a JSON object, names no command
    ///   or several, or carries a key the command doesn't take
    /// - `InvalidRecord` if an insert has no record, or `set` is not a map
    ///   or assigns the ID field
    pub fn parse(statement: &str) -> CoreResult<Self> {
        let trimmed = statement.trim();
        let text = if !trimmed.starts_with('{') {
            format!("{{{trimmed}}}")
        } else if !trimmed.ends_with('}') {
            format!("{trimmed}}}")
        } else {
            trimmed.to_string()
        };

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| CoreError::invalid_request(format!("malformed statement: {e}")))?;
        let Value::Map(mut entries) = value else {
            return Err(CoreError::invalid_request("statement must be an object"));
        };
        Self::from_entries(&mut entries)
    }

    fn from_entries(entries: &mut BTreeMap<String, Value>) -> CoreResult<Self> {
        let mut found: Vec<(&'static str, Value)> = COMMANDS
            .iter()
            .filter_map(|c| entries.remove(*c).map(|v| (*c, v)))
            .collect();
        if found.len() > 1 {
            let names: Vec<&str> = found.iter().map(|(c, _)| *c).collect();
            return Err(CoreError::invalid_request(format!(
                "statement names more than one command: {}",
                names.join(", ")
            )));
        }
        let Some((command, target)) = found.pop() else {
            return Err(CoreError::invalid_request(format!(
                "statement names no command, expected one of {}",
                COMMANDS.join(", ")
            )));
        };

        let Value::Text(name) = target else {
            return Err(CoreError::invalid_request(format!(
                "'{command}' must name a table, got {}",
                target.kind()
            )));
        };
        let set = entries.remove(SET_KEY).filter(|v| !v.is_null());
        let filter = entries.remove(WHERE_KEY);
        if let Some(key) = entries.keys().next() {
            return Err(CoreError::invalid_request(format!(
                "unexpected key '{key}' in '{command}' statement"
            )));
        }

        let takes_set = matches!(command, INSERT_INTO | UPDATE_WHERE);
        let takes_where = matches!(command, SELECT_FROM | UPDATE_WHERE | DELETE_FROM);
        if set.is_some() && !takes_set {
            return Err(CoreError::invalid_request(format!(
                "'{command}' does not take 'set'"
            )));
        }
        if filter.as_ref().is_some_and(|v| !v.is_null()) && !takes_where {
            return Err(CoreError::invalid_request(format!(
                "'{command}' does not take 'where'"
            )));
        }
        let filter = || Filter::from_value(filter.clone().unwrap_or(Value::Null));

        Ok(match command {
            CREATE_TABLE => Self::CreateTable { name },
            DROP_TABLE => Self::DropTable { name },
            INSERT_INTO => {
                let record = set
                    .map(record_from_value)
                    .transpose()?
                    .ok_or_else(|| CoreError::invalid_record("insert needs a 'set' record"))?;
                Self::InsertInto { name, record }
            }
            SELECT_FROM => Self::SelectFrom {
                name,
                filter: filter()?,
            },
            UPDATE_WHERE => Self::UpdateWhere {
                name,
                set: set.map(record_from_value).transpose()?.unwrap_or_default(),
                filter: filter()?,
            },
            _ => Self::DeleteFrom {
                name,
                filter: filter()?,
            },
        })
    }

    /// Renders the request as a statement that [`parse`](Self::parse)
    /// turns back into the same request.
    pub fn to_statement(&self) -> CoreResult<String> {
        let mut root = BTreeMap::new();
        root.insert(
            self.command().to_string(),
            Value::Text(self.table().to_string()),
        );
        match self {
            Self::CreateTable { .. } | Self::DropTable { .. } => {}
            Self::InsertInto { record, .. } => {
                root.insert(SET_KEY.to_string(), Value::Map(record.clone()));
            }
            Self::SelectFrom { filter, .. } | Self::DeleteFrom { filter, .. } => {
                root.insert(WHERE_KEY.to_string(), filter.to_value());
            }
            Self::UpdateWhere { set, filter, .. } => {
                root.insert(SET_KEY.to_string(), Value::Map(set.clone()));
                root.insert(WHERE_KEY.to_string(), filter.to_value());
            }
        }
        let text = serde_json::to_string(&Value::Map(root)).map_err(CodecError::from)?;
        Ok(text)
    }
}

impl std::str::FromStr for Request {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

fn record_from_value(value: Value) -> CoreResult<Record> {
    let Value::Map(record) = value else {
        return Err(CoreError::invalid_record(format!(
            "'set' must be a map, got {}",
            value.kind()
        )));
    };
    if record.contains_key(ID_FIELD) {
        return Err(CoreError::invalid_record(format!(
            "'{ID_FIELD}' is reserved and cannot be assigned"
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsdb_codec::record;

    #[test]
    fn parse_each_command() {
        assert_eq!(
            Request::parse(r#"{"createTable": "T"}"#).unwrap(),
            Request::create_table("T")
        );
        assert_eq!(
            Request::parse(r#"{"dropTable": "T"}"#).unwrap(),
            Request::drop_table("T")
        );
        assert_eq!(
            Request::parse(r#"{"insertInto": "T", "set": {"a": 1}}"#).unwrap(),
            Request::insert_into("T", record! { "a" => 1 })
        );
        assert_eq!(
            Request::parse(r#"{"selectFrom": "T", "where": {"a": [1, 2]}}"#).unwrap(),
            Request::select_from("T", Filter::new().any_of("a", [1, 2]))
        );
        assert_eq!(
            Request::parse(r#"{"updateWhere": "T", "set": {"b": "x"}, "where": {"a": 1}}"#)
                .unwrap(),
            Request::update_where("T", record! { "b" => "x" }, Filter::new().equals("a", 1))
        );
        assert_eq!(
            Request::parse(r#"{"deleteFrom": "T"}"#).unwrap(),
            Request::delete_from("T", Filter::new())
        );
    }

    #[test]
    fn parse_adds_missing_braces() {
        let req = Request::parse(r#" "selectFrom": "T", "where": null "#).unwrap();
        assert_eq!(req, Request::select_from("T", Filter::new()));
        assert!(req.is_query());
        assert_eq!(req.table(), "T");

        let req = Request::parse(r#""insertInto": "T", "set": {"a": 1}"#).unwrap();
        assert_eq!(req, Request::insert_into("T", record! { "a" => 1 }));

        let req = Request::parse(r#"{"dropTable": "T""#).unwrap();
        assert_eq!(req, Request::drop_table("T"));
    }

    #[test]
    fn parse_rejects_bad_statements() {
        for bad in [
            "not json at all",
            "[1, 2]",
            r#"{"table": "T"}"#,
            r#"{"createTable": "A", "dropTable": "B"}"#,
            r#"{"createTable": 5}"#,
            r#"{"createTable": "T", "where": {"a": 1}}"#,
            r#"{"selectFrom": "T", "set": {"a": 1}}"#,
            r#"{"selectFrom": "T", "limit": 3}"#,
            r#"{"selectFrom": "T", "where": 3}"#,
        ] {
            assert!(
                matches!(Request::parse(bad), Err(CoreError::InvalidRequest { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_rejects_bad_records() {
        for bad in [
            r#"{"insertInto": "T"}"#,
            r#"{"insertInto": "T", "set": null}"#,
            r#"{"insertInto": "T", "set": [1]}"#,
            r#"{"insertInto": "T", "set": {"__id": "1"}}"#,
            r#"{"updateWhere": "T", "set": {"__id": "1"}}"#,
        ] {
            assert!(
                matches!(Request::parse(bad), Err(CoreError::InvalidRecord { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn update_without_set_assigns_nothing() {
        let req = Request::parse(r#"{"updateWhere": "T"}"#).unwrap();
        assert_eq!(
            req,
            Request::update_where("T", Record::new(), Filter::new())
        );
    }

    #[test]
    fn statements_parse_back() {
        let requests = [
            Request::create_table("Orders"),
            Request::drop_table("Orders"),
            Request::insert_into("Orders", record! { "Qty" => 2, "Gift" => true }),
            Request::select_from("Orders", Filter::new().ids(["1", "2"])),
            Request::update_where(
                "Orders",
                record! { "Qty" => 3 },
                Filter::new().equals("Product", "Kettle"),
            ),
            Request::delete_from("Orders", Filter::new()),
        ];
        for req in requests {
            let text = req.to_statement().unwrap();
            assert_eq!(text.parse::<Request>().unwrap(), req, "{text}");
        }
    }
}
