//! Transaction-scoped write batching.
//!
//! A transaction does not isolate anything. While one is open on a table
//! registry, every write that would normally rewrite a table file marks
//! that table dirty instead, and [`Transaction::commit`] writes each dirty
//! table once. Reads see the uncommitted writes because they share the
//! same in-memory tables; with connection caching that includes every
//! connection to the directory.
//!
//! Commit is not atomic across tables: if one table fails to persist, the
//! ones written before it stay written.

mod state;

pub use state::{Transaction, TransactionState};
