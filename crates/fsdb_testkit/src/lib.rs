//! # fsdb Testkit
//!
//! Test utilities for fsdb.
//!
//! This crate provides:
//! - Test fixtures: temporary table directories and connections
//! - Property-based test generators using proptest
//! - A model-checking harness and cross-crate integration scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fsdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_connection() {
//!     with_temp_conn(|conn| {
//!         conn.exec(&Request::create_table("T")).unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use fsdb_core::{record, Config, Connection, Filter, Request, Value};
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
