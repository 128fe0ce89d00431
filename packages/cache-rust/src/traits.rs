//! The seam between the cache and whatever stores the rows.

use async_trait::async_trait;
use lazygrid_core::{CountQuery, IdListQuery, PageQuery, Row, RowId};

/// Backing-store capability the cache runs its queries through.
/// Implementations: `SQLite` (feature `sqlite`), null (tests, empty views).
///
/// Calls are only ever made from the cache's background workers, one at a
/// time per worker, so implementations may block inside the future (or hop
/// to `spawn_blocking`) without stalling the presentation thread.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Number of rows matching the query's filter.
    async fn execute_count(&self, query: &CountQuery) -> anyhow::Result<usize>;

    /// Every matching id, in the query's sort order.
    async fn execute_id_list(&self, query: &IdListQuery) -> anyhow::Result<Vec<RowId>>;

    /// At most `query.limit` rows starting at `query.offset`, in sort order,
    /// with their tag and marker id sets populated.
    async fn execute_page(&self, query: &PageQuery) -> anyhow::Result<Vec<Row>>;
}
