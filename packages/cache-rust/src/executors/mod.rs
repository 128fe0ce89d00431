//! [`QueryExecutor`](crate::QueryExecutor) implementations.
//!
//! [`NullExecutor`] answers every query with nothing. [`SqliteExecutor`]
//! (feature `sqlite`) runs the planned queries against a `SQLite` table.

mod null;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use null::NullExecutor;
#[cfg(feature = "sqlite")]
pub use sqlite::{AssociationTable, SqliteExecutor, SqliteSchema};
