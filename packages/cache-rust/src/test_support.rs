//! Shared fixtures for unit tests: an in-memory executor that can be gated,
//! made to fail, and inspected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use lazygrid_core::{
    CountQuery, FilterSpec, FilterValue, IdListQuery, OrderBy, PageQuery, Row, RowId, Value,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify, Semaphore};

use crate::events::CacheEvent;
use crate::traits::QueryExecutor;

/// In-memory tour table: tour `i` (0-based) has id `i + 1`, start time
/// `i * 60` and title `Tour {i:05}`.
pub(crate) struct MockExecutor {
    rows: Vec<Row>,
    gated: bool,
    gate: Semaphore,
    pub started: Notify,
    pub page_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    pub id_list_calls: AtomicUsize,
    pub page_offsets: Mutex<Vec<usize>>,
    failing_offsets: Mutex<HashSet<usize>>,
    fail_counts: AtomicBool,
    fail_id_lists: AtomicBool,
    overfill: AtomicBool,
}

impl MockExecutor {
    pub fn tours(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| {
                let i = i64::try_from(i).unwrap();
                Row::new(RowId(i + 1))
                    .with_value("TourStartTime", Value::Int(i * 60))
                    .with_value("TourTitle", Value::String(format!("Tour {i:05}")))
                    .with_tags(if i % 10 == 0 { vec![1, 2] } else { vec![] })
            })
            .collect();
        Self {
            rows,
            gated: false,
            gate: Semaphore::new(0),
            started: Notify::new(),
            page_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            id_list_calls: AtomicUsize::new(0),
            page_offsets: Mutex::new(Vec::new()),
            failing_offsets: Mutex::new(HashSet::new()),
            fail_counts: AtomicBool::new(false),
            fail_id_lists: AtomicBool::new(false),
            overfill: AtomicBool::new(false),
        }
    }

    /// Every query waits for a [`Self::release`] permit.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn release(&self, queries: usize) {
        self.gate.add_permits(queries);
    }

    pub fn fail_page_at(&self, offset: usize) {
        self.failing_offsets.lock().insert(offset);
    }

    pub fn heal_page_at(&self, offset: usize) {
        self.failing_offsets.lock().remove(&offset);
    }

    pub fn fail_counts(&self) {
        self.fail_counts.store(true, Ordering::SeqCst);
    }

    pub fn fail_id_lists(&self, fail: bool) {
        self.fail_id_lists.store(fail, Ordering::SeqCst);
    }

    /// Page queries return five rows more than asked for.
    pub fn overfill(&self) {
        self.overfill.store(true, Ordering::SeqCst);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        self.started.notify_one();
        if self.gated {
            self.gate.acquire().await.unwrap().forget();
        }
    }

    /// Supports no filter or ` AND TourStartTime >= ?`.
    fn matching(&self, filter: &FilterSpec) -> Vec<&Row> {
        if filter.is_none() {
            return self.rows.iter().collect();
        }
        assert_eq!(filter.clause(), " AND TourStartTime >= ?");
        let Some(FilterValue::Int(min)) = filter.params().first() else {
            panic!("unsupported filter params {:?}", filter.params());
        };
        self.rows
            .iter()
            .filter(|r| r.value("TourStartTime").and_then(Value::as_int) >= Some(*min))
            .collect()
    }

    fn ordered(&self, order_by: &OrderBy, filter: &FilterSpec) -> Vec<&Row> {
        let mut rows = self.matching(filter);
        rows.sort_by(|a, b| {
            for term in order_by.terms() {
                let ordering = if term.column.eq_ignore_ascii_case("TourId") {
                    a.id.cmp(&b.id)
                } else {
                    let null = Value::Null;
                    let av = a.value(&term.column).unwrap_or(&null);
                    let bv = b.value(&term.column).unwrap_or(&null);
                    av.total_cmp(bv)
                };
                let ordering = if term.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        rows
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute_count(&self, query: &CountQuery) -> anyhow::Result<usize> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated count failure"));
        }
        Ok(self.matching(&query.filter).len())
    }

    async fn execute_id_list(&self, query: &IdListQuery) -> anyhow::Result<Vec<RowId>> {
        self.id_list_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail_id_lists.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated id scan failure"));
        }
        Ok(self
            .ordered(&query.order_by, &query.filter)
            .into_iter()
            .map(|r| r.id)
            .collect())
    }

    async fn execute_page(&self, query: &PageQuery) -> anyhow::Result<Vec<Row>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.page_offsets.lock().push(query.offset);
        self.pass_gate().await;
        if self.failing_offsets.lock().contains(&query.offset) {
            return Err(anyhow!("simulated backing-store failure"));
        }
        let limit = if self.overfill.load(Ordering::SeqCst) {
            query.limit + 5
        } else {
            query.limit
        };
        Ok(self
            .ordered(&query.order_by, &query.filter)
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Next event, failing the test after five seconds.
pub(crate) async fn next_event(rx: &mut broadcast::Receiver<CacheEvent>) -> CacheEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no cache event within 5s")
        .expect("event channel closed")
}

/// Skips events until a `DataChanged` arrives.
pub(crate) async fn wait_for_data(rx: &mut broadcast::Receiver<CacheEvent>) -> CacheEvent {
    loop {
        let event = next_event(rx).await;
        if matches!(event, CacheEvent::DataChanged { .. }) {
            return event;
        }
    }
}

/// Polls `condition` every millisecond for up to five seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
