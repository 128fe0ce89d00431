//! Page fetch coordination.
//!
//! [`PageFetchCoordinator`] turns cache misses into at most one backing-store
//! query per page per generation. Requests arrive from any thread; fetches
//! run on a single background worker in request order.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use lazygrid_core::{page_offset, FetchKey, Generation, PageState, QueryPlanner, Row};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{CacheError, QueryKind};
use crate::events::{CacheEvent, EventSender};
use crate::row_cache::RowCache;
use crate::stats::CacheStats;
use crate::traits::QueryExecutor;
use crate::view::{SharedView, ViewState};
use crate::worker::{BackgroundRunnable, BackgroundWorker};

pub(crate) const PAGE_WORKER: &str = "page-fetch";

/// Work item for the page-fetch worker.
#[derive(Debug)]
pub enum FetchJob {
    Page {
        fetch_key: FetchKey,
        view: Arc<ViewState>,
    },
    Count {
        view: Arc<ViewState>,
    },
}

/// What a fetch request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A job was enqueued.
    Scheduled,
    /// A job for the same generation is already queued or running.
    Pending,
    /// The result is already cached for this generation (possibly empty).
    Fetched,
    /// The request named a generation that is no longer current.
    Stale,
    /// The worker has been shut down.
    Refused,
}

impl RequestOutcome {
    /// `true` if this call enqueued a job.
    #[must_use]
    pub fn is_scheduled(self) -> bool {
        self == RequestOutcome::Scheduled
    }
}

/// Requests accepted but not yet completed, for one generation.
#[derive(Debug, Default)]
struct PendingRequests {
    generation: Generation,
    pages: HashSet<FetchKey>,
    count: bool,
}

impl PendingRequests {
    /// Forgets everything recorded for an older generation.
    fn roll_to(&mut self, generation: Generation) {
        if generation > self.generation {
            self.generation = generation;
            self.pages.clear();
            self.count = false;
        }
    }
}

/// State shared between the coordinator handle and its worker.
struct FetchShared {
    cache: Arc<RowCache>,
    executor: Arc<dyn QueryExecutor>,
    planner: QueryPlanner,
    events: EventSender,
    stats: Arc<CacheStats>,
    pending: Mutex<PendingRequests>,
    page_size: usize,
}

impl FetchShared {
    async fn fetch_page(&self, fetch_key: FetchKey, view: &ViewState) {
        let generation = view.generation;
        if self.cache.generation() != generation {
            debug!(fetch_key, generation, "skipping page fetch queued before a reset");
            self.stats.record_stale_discard();
            return;
        }

        let offset = page_offset(fetch_key, self.page_size);
        let query = self
            .planner
            .build_page_query(&view.sort, &view.filter, offset, self.page_size);
        let result = self.executor.execute_page(&query).await;
        self.on_page_fetched(fetch_key, generation, result);
    }

    /// Stores a finished page and notifies subscribers.
    ///
    /// A failed query stores an empty page: the page counts as fetched for
    /// this generation and is not retried until the next reset.
    fn on_page_fetched(
        &self,
        fetch_key: FetchKey,
        generation: Generation,
        result: anyhow::Result<Vec<Row>>,
    ) {
        let mut rows = match result {
            Ok(rows) => {
                self.stats.record_page_fetched();
                rows
            }
            Err(source) => {
                let err = CacheError::QueryExecution {
                    query: QueryKind::Page,
                    source,
                };
                warn!(fetch_key, generation, error = %err, "page left empty for this generation");
                self.stats.record_page_failed();
                Vec::new()
            }
        };
        if rows.len() > self.page_size {
            debug!(
                fetch_key,
                returned = rows.len(),
                page_size = self.page_size,
                "truncating oversized page"
            );
            rows.truncate(self.page_size);
        }

        let row_count = rows.len();
        let offset = page_offset(fetch_key, self.page_size);
        let applied = self.cache.put(fetch_key, offset, rows, generation);

        {
            let mut pending = self.pending.lock();
            if pending.generation == generation {
                pending.pages.remove(&fetch_key);
            }
        }

        let announced = applied
            && self
                .cache
                .if_current(generation, || {
                    self.events.send(CacheEvent::DataChanged { generation });
                })
                .is_some();
        if announced {
            debug!(fetch_key, generation, rows = row_count, "page stored");
        } else {
            debug!(fetch_key, generation, "discarding page fetched for an abandoned generation");
            self.stats.record_stale_discard();
        }
    }

    async fn fetch_count(&self, view: &ViewState) {
        let generation = view.generation;
        if self.cache.generation() != generation {
            debug!(generation, "skipping row count queued before a reset");
            self.stats.record_stale_discard();
            return;
        }

        self.stats.record_count_query();
        let query = self.planner.build_count_query(&view.filter);
        let count = match self.executor.execute_count(&query).await {
            Ok(count) => count,
            Err(source) => {
                let err = CacheError::QueryExecution {
                    query: QueryKind::Count,
                    source,
                };
                warn!(generation, error = %err, "treating row count as 0 for this generation");
                0
            }
        };

        let applied = self.cache.set_total_count(count, generation);
        {
            let mut pending = self.pending.lock();
            if pending.generation == generation {
                pending.count = false;
            }
        }

        let announced = applied
            && self
                .cache
                .if_current(generation, || {
                    self.events.send(CacheEvent::CountChanged { generation, count });
                })
                .is_some();
        if announced {
            debug!(generation, count, "row count stored");
        } else {
            debug!(generation, "discarding row count for an abandoned generation");
            self.stats.record_stale_discard();
        }
    }
}

/// Runs [`FetchJob`]s on the page-fetch worker.
pub struct PageFetchRunnable {
    shared: Arc<FetchShared>,
}

#[async_trait]
impl BackgroundRunnable for PageFetchRunnable {
    type Task = FetchJob;

    async fn run(&mut self, job: FetchJob) {
        match job {
            FetchJob::Page { fetch_key, view } => {
                let span = info_span!("page_fetch", fetch_key, generation = view.generation);
                self.shared.fetch_page(fetch_key, &view).instrument(span).await;
            }
            FetchJob::Count { view } => {
                let span = info_span!("row_count", generation = view.generation);
                self.shared.fetch_count(&view).instrument(span).await;
            }
        }
    }

    async fn shutdown(&mut self) {
        let mut pending = self.shared.pending.lock();
        pending.pages.clear();
        pending.count = false;
    }
}

/// Single-flight page loader backed by one background worker.
pub struct PageFetchCoordinator {
    shared: Arc<FetchShared>,
    view: SharedView,
    worker: BackgroundWorker<PageFetchRunnable>,
}

impl PageFetchCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime: &Handle,
        cache: Arc<RowCache>,
        executor: Arc<dyn QueryExecutor>,
        planner: QueryPlanner,
        view: SharedView,
        events: EventSender,
        stats: Arc<CacheStats>,
        page_size: usize,
    ) -> Self {
        let shared = Arc::new(FetchShared {
            cache,
            executor,
            planner,
            events,
            stats,
            pending: Mutex::new(PendingRequests::default()),
            page_size: page_size.max(1),
        });
        let runnable = PageFetchRunnable {
            shared: Arc::clone(&shared),
        };
        let worker = BackgroundWorker::start_on(runtime, PAGE_WORKER, runnable);
        Self {
            shared,
            view,
            worker,
        }
    }

    /// Schedules a fetch of page `fetch_key` for `generation`.
    ///
    /// At most one fetch per page per generation is ever scheduled; every
    /// other call reports why nothing was enqueued.
    pub fn request_page(&self, fetch_key: FetchKey, generation: Generation) -> RequestOutcome {
        let view = self.view.load_full();
        if view.generation != generation {
            return RequestOutcome::Stale;
        }

        {
            let mut pending = self.shared.pending.lock();
            pending.roll_to(generation);
            if pending.generation != generation {
                return RequestOutcome::Stale;
            }
            if pending.pages.contains(&fetch_key) {
                return RequestOutcome::Pending;
            }
            if self.shared.cache.is_page_fetched(fetch_key) {
                return RequestOutcome::Fetched;
            }
            pending.pages.insert(fetch_key);
        }

        match self.worker.submit(FetchJob::Page { fetch_key, view }) {
            Ok(()) => {
                self.shared.stats.record_page_requested();
                RequestOutcome::Scheduled
            }
            Err(err) => {
                self.shared.pending.lock().pages.remove(&fetch_key);
                warn!(fetch_key, generation, error = %err, "page fetch not scheduled");
                RequestOutcome::Refused
            }
        }
    }

    /// Schedules the total row count query for `generation`, once.
    /// `Fetched` means the count is already cached.
    pub fn request_count(&self, generation: Generation) -> RequestOutcome {
        let view = self.view.load_full();
        if view.generation != generation {
            return RequestOutcome::Stale;
        }

        {
            let mut pending = self.shared.pending.lock();
            pending.roll_to(generation);
            if pending.generation != generation {
                return RequestOutcome::Stale;
            }
            if pending.count {
                return RequestOutcome::Pending;
            }
            if self.shared.cache.total_count().is_some() {
                return RequestOutcome::Fetched;
            }
            pending.count = true;
        }

        match self.worker.submit(FetchJob::Count { view }) {
            Ok(()) => RequestOutcome::Scheduled,
            Err(err) => {
                self.shared.pending.lock().count = false;
                warn!(generation, error = %err, "row count not scheduled");
                RequestOutcome::Refused
            }
        }
    }

    /// Lifecycle of page `fetch_key` as seen from `generation`.
    #[must_use]
    pub fn page_state(&self, fetch_key: FetchKey, generation: Generation) -> PageState {
        if self.shared.cache.generation() != generation {
            return PageState::Unrequested;
        }
        if self.shared.cache.is_page_fetched(fetch_key) {
            return PageState::Fetched;
        }
        let pending = self.shared.pending.lock();
        if pending.generation == generation && pending.pages.contains(&fetch_key) {
            PageState::Pending
        } else {
            PageState::Unrequested
        }
    }

    /// Drops single-flight bookkeeping for generations older than
    /// `generation`. Jobs already queued stay queued and are discarded when
    /// they reach the worker.
    pub fn reset(&self, generation: Generation) {
        self.shared.pending.lock().roll_to(generation);
    }

    /// Stops the worker after the job in progress. Queued jobs are dropped.
    pub async fn shutdown(&mut self) {
        self.worker.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use lazygrid_core::{RowId, SortField, SortSpec};
    use tokio::sync::broadcast;

    use super::*;
    use crate::config::CacheConfig;
    use crate::test_support::{wait_for_data, wait_until, MockExecutor};
    use crate::view::shared_view;

    struct Harness {
        cache: Arc<RowCache>,
        view: SharedView,
        stats: Arc<CacheStats>,
        mock: Arc<MockExecutor>,
        rx: broadcast::Receiver<CacheEvent>,
        coordinator: PageFetchCoordinator,
    }

    fn harness(mock: MockExecutor, page_size: usize) -> Harness {
        let config = CacheConfig::default();
        let cache = Arc::new(RowCache::new());
        let view = shared_view(ViewState {
            sort: SortSpec::new(vec![SortField::ascending("TIME_DATE")]),
            ..ViewState::default()
        });
        let events = EventSender::new(64);
        let rx = events.subscribe();
        let stats = Arc::new(CacheStats::new());
        let mock = Arc::new(mock);
        let coordinator = PageFetchCoordinator::new(
            &Handle::current(),
            Arc::clone(&cache),
            mock.clone(),
            config.planner(),
            Arc::clone(&view),
            events,
            Arc::clone(&stats),
            page_size,
        );
        Harness {
            cache,
            view,
            stats,
            mock,
            rx,
            coordinator,
        }
    }

    #[tokio::test]
    async fn second_request_for_a_page_is_coalesced() {
        let mut h = harness(MockExecutor::tours(250), 100);

        assert_eq!(h.coordinator.request_page(1, 0), RequestOutcome::Scheduled);
        assert_eq!(h.coordinator.request_page(1, 0), RequestOutcome::Pending);
        assert_eq!(h.coordinator.page_state(1, 0), PageState::Pending);

        let event = wait_for_data(&mut h.rx).await;
        assert_eq!(event, CacheEvent::DataChanged { generation: 0 });
        assert_eq!(h.cache.get(100).unwrap().id, RowId(101));
        assert_eq!(h.coordinator.page_state(1, 0), PageState::Fetched);

        // Fetched pages are not requested again.
        assert_eq!(h.coordinator.request_page(1, 0), RequestOutcome::Fetched);
        assert_eq!(h.mock.page_calls(), 1);
        assert_eq!(h.stats.snapshot().pages_requested, 1);
    }

    #[tokio::test]
    async fn last_page_may_be_short() {
        let mut h = harness(MockExecutor::tours(250), 100);
        h.coordinator.request_page(2, 0);
        wait_for_data(&mut h.rx).await;

        assert_eq!(h.cache.fetched_page_len(2), Some(50));
        assert_eq!(h.cache.get(249).unwrap().id, RowId(250));
        assert!(h.cache.get(250).is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_page_empty_and_fetched() {
        let mut h = harness(MockExecutor::tours(250), 100);
        h.mock.fail_page_at(100);

        h.coordinator.request_page(1, 0);
        wait_for_data(&mut h.rx).await;

        assert!(h.cache.get(100).is_none());
        assert_eq!(h.coordinator.page_state(1, 0), PageState::Fetched);
        assert_eq!(h.coordinator.request_page(1, 0), RequestOutcome::Fetched);
        assert_eq!(h.mock.page_calls(), 1);

        let stats = h.stats.snapshot();
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.pages_fetched, 0);
    }

    #[tokio::test]
    async fn oversized_result_is_truncated_to_page_size() {
        let mut h = harness(MockExecutor::tours(250), 100);
        h.mock.overfill();

        h.coordinator.request_page(0, 0);
        wait_for_data(&mut h.rx).await;

        assert_eq!(h.cache.fetched_page_len(0), Some(100));
        assert!(h.cache.get(100).is_none());
    }

    #[tokio::test]
    async fn request_for_stale_generation_schedules_nothing() {
        let h = harness(MockExecutor::tours(10), 100);
        assert_eq!(h.coordinator.request_page(0, 7), RequestOutcome::Stale);
        assert_eq!(h.coordinator.request_count(7), RequestOutcome::Stale);
        assert_eq!(h.coordinator.page_state(0, 7), PageState::Unrequested);
        assert_eq!(h.stats.snapshot().pages_requested, 0);
    }

    #[tokio::test]
    async fn page_in_flight_across_reset_is_discarded() {
        let mut h = harness(MockExecutor::tours(250).gated(), 100);

        h.coordinator.request_page(0, 0);
        h.mock.started.notified().await;

        let generation = h.cache.reset();
        h.view.store(Arc::new(ViewState {
            generation,
            ..ViewState::default()
        }));
        h.coordinator.reset(generation);
        h.mock.release(1);

        let stats = Arc::clone(&h.stats);
        wait_until(|| stats.snapshot().stale_discards == 1).await;
        assert!(h.cache.is_empty());
        assert!(!h.cache.is_page_fetched(0));
        assert!(h.rx.try_recv().is_err());

        // The same page is eligible again in the new generation.
        assert!(h.coordinator.request_page(0, generation).is_scheduled());
        h.mock.release(1);
        let event = wait_for_data(&mut h.rx).await;
        assert_eq!(event.generation(), generation);
    }

    #[tokio::test]
    async fn count_is_single_flight_and_announced() {
        let mut h = harness(MockExecutor::tours(2500), 1000);

        assert_eq!(h.coordinator.request_count(0), RequestOutcome::Scheduled);
        assert_eq!(h.coordinator.request_count(0), RequestOutcome::Pending);

        let event = crate::test_support::next_event(&mut h.rx).await;
        assert_eq!(
            event,
            CacheEvent::CountChanged {
                generation: 0,
                count: 2500
            }
        );
        assert_eq!(h.cache.total_count(), Some(2500));
        assert_eq!(h.coordinator.request_count(0), RequestOutcome::Fetched);
        assert_eq!(h.mock.count_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn count_in_flight_across_reset_is_discarded() {
        let mut h = harness(MockExecutor::tours(2500).gated(), 1000);

        assert!(h.coordinator.request_count(0).is_scheduled());
        h.mock.started.notified().await;

        let generation = h.cache.reset();
        h.view.store(Arc::new(ViewState {
            generation,
            ..ViewState::default()
        }));
        h.coordinator.reset(generation);
        h.mock.release(1);

        let stats = Arc::clone(&h.stats);
        wait_until(|| stats.snapshot().stale_discards == 1).await;
        assert_eq!(h.cache.total_count(), None);
        assert!(h.rx.try_recv().is_err());

        assert!(h.coordinator.request_count(generation).is_scheduled());
        h.mock.release(1);
        let event = crate::test_support::next_event(&mut h.rx).await;
        assert_eq!(
            event,
            CacheEvent::CountChanged {
                generation,
                count: 2500
            }
        );
    }

    #[tokio::test]
    async fn failed_count_reports_zero() {
        let mut h = harness(MockExecutor::tours(2500), 1000);
        h.mock.fail_counts();

        h.coordinator.request_count(0);
        let event = crate::test_support::next_event(&mut h.rx).await;
        assert_eq!(
            event,
            CacheEvent::CountChanged {
                generation: 0,
                count: 0
            }
        );
    }

    #[tokio::test]
    async fn requests_after_shutdown_are_refused() {
        let mut h = harness(MockExecutor::tours(10), 100);
        h.coordinator.shutdown().await;

        assert_eq!(h.coordinator.request_page(0, 0), RequestOutcome::Refused);
        assert_eq!(h.coordinator.page_state(0, 0), PageState::Unrequested);
    }
}
