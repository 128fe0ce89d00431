//! No-op [`QueryExecutor`] implementation.

use async_trait::async_trait;
use lazygrid_core::{CountQuery, IdListQuery, PageQuery, Row, RowId};

use crate::traits::QueryExecutor;

/// Executor over an empty table.
///
/// Every count is 0 and every page or id list is empty. Used for views that
/// have no backing store attached yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExecutor;

#[async_trait]
impl QueryExecutor for NullExecutor {
    async fn execute_count(&self, _query: &CountQuery) -> anyhow::Result<usize> {
        Ok(0)
    }

    async fn execute_id_list(&self, _query: &IdListQuery) -> anyhow::Result<Vec<RowId>> {
        Ok(Vec::new())
    }

    async fn execute_page(&self, _query: &PageQuery) -> anyhow::Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{CacheConfig, CacheEvent, VirtualRowProvider};

    #[tokio::test]
    async fn empty_view_settles_at_zero_rows() {
        let provider = VirtualRowProvider::new(Arc::new(NullExecutor), CacheConfig::default());
        let mut rx = provider.subscribe();

        assert_eq!(provider.row_count(), 0);
        let event = rx.recv().await.unwrap();
        assert_eq!(event, CacheEvent::CountChanged { generation: 0, count: 0 });

        assert!(provider.row_at(0).is_none());
        let event = rx.recv().await.unwrap();
        assert_eq!(event, CacheEvent::DataChanged { generation: 0 });
        assert!(provider.row_at(0).is_none());
        assert_eq!(provider.stats().pages_requested, 1);
    }
}
