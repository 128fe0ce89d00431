//! The virtualized grid's data source.

use std::ops::Range;
use std::sync::Arc;

use lazygrid_core::{
    fetch_key, pages_overlapping, FilterSpec, Generation, PageState, Row, RowId, SortSpec,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::CacheConfig;
use crate::coordinator::PageFetchCoordinator;
use crate::events::{CacheEvent, EventSender};
use crate::resolver::{PositionsFuture, RowIndexResolver};
use crate::row_cache::RowCache;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::traits::QueryExecutor;
use crate::view::{shared_view, SharedView, ViewState};

/// Row source for a virtualized grid over a large sorted, filtered table.
///
/// Every method except [`Self::shutdown`] is synchronous and returns without
/// touching the backing store: misses schedule background work and report
/// "not yet loaded", and the grid redraws on [`CacheEvent`]s.
///
/// Sort and filter changes are expected from one thread (the presentation
/// thread). Reads may come from any thread.
pub struct VirtualRowProvider {
    page_size: usize,
    cache: Arc<RowCache>,
    view: SharedView,
    coordinator: PageFetchCoordinator,
    resolver: RowIndexResolver,
    events: EventSender,
    stats: Arc<CacheStats>,
}

impl VirtualRowProvider {
    /// Creates a provider whose workers run on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime; use
    /// [`Self::with_runtime`] from plain threads.
    pub fn new(executor: Arc<dyn QueryExecutor>, config: CacheConfig) -> Self {
        Self::with_runtime(&Handle::current(), executor, config)
    }

    pub fn with_runtime(
        runtime: &Handle,
        executor: Arc<dyn QueryExecutor>,
        config: CacheConfig,
    ) -> Self {
        let config = config.normalized();
        let planner = config.planner();
        let cache = Arc::new(RowCache::new());
        let view = shared_view(ViewState::default());
        let events = EventSender::new(config.event_capacity);
        let stats = Arc::new(CacheStats::new());

        let coordinator = PageFetchCoordinator::new(
            runtime,
            Arc::clone(&cache),
            Arc::clone(&executor),
            planner.clone(),
            Arc::clone(&view),
            events.clone(),
            Arc::clone(&stats),
            config.page_size,
        );
        let resolver = RowIndexResolver::new(
            runtime,
            Arc::clone(&cache),
            executor,
            planner,
            Arc::clone(&view),
            Arc::clone(&stats),
        );

        Self {
            page_size: config.page_size,
            cache,
            view,
            coordinator,
            resolver,
            events,
            stats,
        }
    }

    /// The row at `position`, or `None` if it is not loaded yet.
    ///
    /// A miss schedules the containing page (at most once per generation).
    /// `None` is also the permanent answer for positions past the end of the
    /// data and for pages whose fetch failed; the grid renders them blank.
    pub fn row_at(&self, position: usize) -> Option<Arc<Row>> {
        if let Some(row) = self.cache.get(position) {
            self.stats.record_row_hit();
            return Some(row);
        }
        self.stats.record_row_miss();
        let generation = self.generation();
        self.coordinator
            .request_page(fetch_key(position, self.page_size), generation);
        None
    }

    /// The row at `position` if cached. Never schedules a fetch.
    #[must_use]
    pub fn cached_row(&self, position: usize) -> Option<Arc<Row>> {
        self.cache.get(position)
    }

    /// Total rows in the current view.
    ///
    /// Returns 0 until the count query completes; the first call schedules
    /// it and a [`CacheEvent::CountChanged`] announces the result.
    pub fn row_count(&self) -> usize {
        if let Some(count) = self.cache.total_count() {
            return count;
        }
        self.coordinator.request_count(self.generation());
        0
    }

    /// Id of the row at `position`, from a fetched page or the id scan.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<RowId> {
        self.cache.id_at(position)
    }

    /// Position of `id` if already known to this generation. Never schedules
    /// work; use [`Self::resolve_positions`] for ids not yet seen.
    #[must_use]
    pub fn position_of(&self, id: RowId) -> Option<usize> {
        self.cache.id_to_position(id)
    }

    /// Positions of `ids` in the current view, in request order, omitting
    /// ids that are not part of it.
    pub fn resolve_positions(&self, ids: Vec<RowId>) -> PositionsFuture {
        self.resolver.resolve_positions(ids)
    }

    /// Replaces the sort order and resets the cache.
    pub fn set_sort(&self, sort: SortSpec) {
        let filter = self.view.load().filter.clone();
        self.reset_view(sort, filter);
    }

    /// Replaces the filter and resets the cache.
    pub fn set_filter(&self, filter: FilterSpec) {
        let sort = self.view.load().sort.clone();
        self.reset_view(sort, filter);
    }

    /// Drops all cached data, keeping sort and filter, e.g. after the
    /// backing table changed.
    pub fn invalidate(&self) {
        let current = self.view.load_full();
        self.reset_view(current.sort.clone(), current.filter.clone());
    }

    fn reset_view(&self, sort: SortSpec, filter: FilterSpec) -> Generation {
        let generation = self.cache.reset();
        self.view.store(Arc::new(ViewState {
            generation,
            sort,
            filter,
        }));
        self.coordinator.reset(generation);
        info!(generation, "row cache reset");
        generation
    }

    #[must_use]
    pub fn sort_spec(&self) -> SortSpec {
        self.view.load().sort.clone()
    }

    #[must_use]
    pub fn filter_spec(&self) -> FilterSpec {
        self.view.load().filter.clone()
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.view.load().generation
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Lifecycle of the page containing `position`.
    #[must_use]
    pub fn page_state(&self, position: usize) -> PageState {
        self.coordinator
            .page_state(fetch_key(position, self.page_size), self.generation())
    }

    /// Schedules every page overlapping `positions` that is not cached yet,
    /// e.g. the visible range plus a margin.
    pub fn prefetch(&self, positions: Range<usize>) {
        let generation = self.generation();
        for key in pages_overlapping(positions, self.page_size) {
            self.coordinator.request_page(key, generation);
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops both workers. Reads keep answering from the cache; misses are
    /// no longer fetched.
    pub async fn shutdown(&mut self) {
        self.coordinator.shutdown().await;
        self.resolver.shutdown().await;
    }
}
