//! `LazyGrid` cache: lazy-loading row cache behind a virtualized grid.
//!
//! [`VirtualRowProvider`] answers `row_at`/`row_count` from memory without
//! blocking, fetching missing pages on a background worker and publishing
//! [`CacheEvent`]s when data arrives.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executors;
pub mod provider;
pub mod resolver;
pub mod row_cache;
pub mod stats;
pub mod traits;
pub mod view;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CacheConfig;
pub use coordinator::{PageFetchCoordinator, RequestOutcome};
pub use error::{CacheError, QueryKind};
pub use events::{CacheEvent, EventSender};
pub use executors::NullExecutor;
#[cfg(feature = "sqlite")]
pub use executors::{AssociationTable, SqliteExecutor, SqliteSchema};
pub use provider::VirtualRowProvider;
pub use resolver::{PositionsFuture, RowIndexResolver};
pub use row_cache::RowCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use traits::QueryExecutor;
pub use view::{SharedView, ViewState};
