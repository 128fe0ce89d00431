//! Row id -> position resolution.
//!
//! Restoring a selection after a re-sort needs the positions of rows that
//! may never have been fetched. [`RowIndexResolver`] loads the complete
//! ordered id list once per generation on its own worker, so a long scan
//! never delays page fetches.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use lazygrid_core::{QueryPlanner, RowId};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{CacheError, QueryKind};
use crate::row_cache::RowCache;
use crate::stats::CacheStats;
use crate::traits::QueryExecutor;
use crate::view::{SharedView, ViewState};
use crate::worker::{BackgroundRunnable, BackgroundWorker};

pub(crate) const INDEX_WORKER: &str = "id-scan";

/// Positions of requested row ids, in request order. Ids not present in the
/// current view are omitted.
///
/// Resolves to [`CacheError::WorkerStopped`] if the resolver shut down
/// before answering.
#[must_use = "futures do nothing unless polled"]
pub struct PositionsFuture {
    inner: PositionsInner,
}

enum PositionsInner {
    Ready(Option<Vec<usize>>),
    Waiting(oneshot::Receiver<Vec<usize>>),
}

impl PositionsFuture {
    fn ready(positions: Vec<usize>) -> Self {
        Self {
            inner: PositionsInner::Ready(Some(positions)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Vec<usize>>) -> Self {
        Self {
            inner: PositionsInner::Waiting(rx),
        }
    }
}

impl Future for PositionsFuture {
    type Output = Result<Vec<usize>, CacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            PositionsInner::Ready(positions) => Poll::Ready(Ok(positions.take().unwrap_or_default())),
            PositionsInner::Waiting(rx) => Pin::new(rx).poll(cx).map(|reply| {
                reply.map_err(|_| CacheError::WorkerStopped {
                    worker: INDEX_WORKER,
                })
            }),
        }
    }
}

/// Work item for the id-scan worker.
pub struct IndexJob {
    ids: Vec<RowId>,
    view: Arc<ViewState>,
    reply: oneshot::Sender<Vec<usize>>,
}

struct ScanShared {
    cache: Arc<RowCache>,
    executor: Arc<dyn QueryExecutor>,
    planner: QueryPlanner,
    stats: Arc<CacheStats>,
}

impl ScanShared {
    async fn resolve(&self, ids: &[RowId], view: &ViewState) -> Vec<usize> {
        let generation = view.generation;
        if let Some(list) = self.cache.id_list(generation) {
            return positions_in(&list, ids);
        }
        if self.cache.generation() != generation {
            debug!(generation, "skipping id scan queued before a reset");
            self.stats.record_stale_discard();
            return Vec::new();
        }

        self.stats.record_id_scan();
        let query = self.planner.build_id_list_query(&view.sort, &view.filter);
        match self.executor.execute_id_list(&query).await {
            Ok(all_ids) => {
                let list = Arc::new(all_ids);
                if self.cache.store_id_list(Arc::clone(&list), generation) {
                    debug!(generation, ids = list.len(), "id list stored");
                    positions_in(&list, ids)
                } else {
                    debug!(generation, "discarding id list scanned for an abandoned generation");
                    self.stats.record_stale_discard();
                    Vec::new()
                }
            }
            Err(source) => {
                let err = CacheError::QueryExecution {
                    query: QueryKind::IdList,
                    source,
                };
                warn!(generation, error = %err, "answering from fetched pages only");
                ids.iter()
                    .filter_map(|id| self.cache.id_to_position(*id))
                    .collect()
            }
        }
    }
}

/// Runs [`IndexJob`]s on the id-scan worker.
pub struct IdScanRunnable {
    shared: Arc<ScanShared>,
}

#[async_trait]
impl BackgroundRunnable for IdScanRunnable {
    type Task = IndexJob;

    async fn run(&mut self, job: IndexJob) {
        let span = info_span!("id_scan", generation = job.view.generation, requested = job.ids.len());
        let positions = self
            .shared
            .resolve(&job.ids, &job.view)
            .instrument(span)
            .await;
        // The caller may have dropped the future.
        let _ = job.reply.send(positions);
    }
}

/// Maps row ids to positions in the current sort order.
pub struct RowIndexResolver {
    shared: Arc<ScanShared>,
    view: SharedView,
    worker: BackgroundWorker<IdScanRunnable>,
}

impl RowIndexResolver {
    pub fn new(
        runtime: &Handle,
        cache: Arc<RowCache>,
        executor: Arc<dyn QueryExecutor>,
        planner: QueryPlanner,
        view: SharedView,
        stats: Arc<CacheStats>,
    ) -> Self {
        let shared = Arc::new(ScanShared {
            cache,
            executor,
            planner,
            stats,
        });
        let runnable = IdScanRunnable {
            shared: Arc::clone(&shared),
        };
        let worker = BackgroundWorker::start_on(runtime, INDEX_WORKER, runnable);
        Self {
            shared,
            view,
            worker,
        }
    }

    /// Positions of `ids` in the current view.
    ///
    /// Answers immediately once the id list for the current generation is
    /// cached. Otherwise the first call scans every id on the worker and
    /// later calls reuse the scan.
    pub fn resolve_positions(&self, ids: Vec<RowId>) -> PositionsFuture {
        if ids.is_empty() {
            return PositionsFuture::ready(Vec::new());
        }
        let view = self.view.load_full();
        if let Some(list) = self.shared.cache.id_list(view.generation) {
            return PositionsFuture::ready(positions_in(&list, &ids));
        }

        let (reply, rx) = oneshot::channel();
        if let Err(err) = self.worker.submit(IndexJob { ids, view, reply }) {
            // The dropped reply sender resolves the future to the same error.
            warn!(error = %err, "id scan not scheduled");
        }
        PositionsFuture::waiting(rx)
    }

    /// Stops the worker. Pending futures resolve to an error.
    pub async fn shutdown(&mut self) {
        self.worker.stop().await;
    }
}

/// Single pass over `list`, returning the position of each of `ids` that
/// occurs in it, in `ids` order.
fn positions_in(list: &[RowId], ids: &[RowId]) -> Vec<usize> {
    let wanted: HashSet<RowId> = ids.iter().copied().collect();
    let mut found: HashMap<RowId, usize> = HashMap::with_capacity(wanted.len());
    for (position, id) in list.iter().enumerate() {
        if wanted.contains(id) {
            found.entry(*id).or_insert(position);
            if found.len() == wanted.len() {
                break;
            }
        }
    }
    ids.iter().filter_map(|id| found.get(id).copied()).collect()
}
