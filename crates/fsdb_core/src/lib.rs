//! # fsdb Core
//!
//! Table storage and query engine for fsdb.
//!
//! fsdb keeps each table as one file in a directory, holding the table's
//! complete record set. Tables are loaded into memory, queried there, and
//! rewritten in full whenever they change.
//!
//! This crate provides:
//! - Record matching against filter sets
//! - Tables with lazy, modification-time driven reloads
//! - A table registry per connection directory
//! - Transactions that defer table writes until commit
//! - Connections that run structured requests
//! - A driver that opens connections, optionally sharing tables between them
//!
//! ## Usage
//!
//! ```no_run
//! use fsdb_core::{record, Config, Driver, Filter, Request};
//!
//! let driver = Driver::json(Config::default());
//! let mut conn = driver.open("data")?;
//!
//! conn.begin()?;
//! conn.exec(&Request::insert_into("Customers", record! { "Name" => "Alice", "City" => "Berlin" }))?;
//! conn.commit()?;
//!
//! for row in conn.query(&Request::select_from("Customers", Filter::new().equals("City", "Berlin")))? {
//!     println!("{row:?}");
//! }
//! # Ok::<(), fsdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod dir;
mod driver;
mod error;
mod filter;
mod registry;
mod request;
mod rows;
mod stats;
mod table;
mod transaction;

pub use config::{Config, IdStrategy};
pub use connection::Connection;
pub use dir::{validate_table_name, TableDir};
pub use driver::Driver;
pub use error::{CoreError, CoreResult};
pub use filter::{matches, Filter, ID_FIELD};
pub use registry::TableRegistry;
pub use request::Request;
pub use rows::{ExecResult, Row, Rows};
pub use stats::{StatsSnapshot, StoreStats};
pub use table::Table;
pub use transaction::{Transaction, TransactionState};

pub use fsdb_codec::{
    record, JsonFormat, Record, RecordId, RecordSet, TableFormat, TomlFormat, Value,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
