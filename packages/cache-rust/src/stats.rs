//! Cache counters.
//!
//! Every counter is published twice: through the `metrics` facade (a no-op
//! unless the host installs a recorder) and into an in-process
//! [`CacheStats`] that debug overlays and tests read via a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

/// Point-in-time copy of the cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct CacheStatsSnapshot {
    pub row_hits: u64,
    pub row_misses: u64,
    /// Page fetch jobs enqueued (single-flight survivors).
    pub pages_requested: u64,
    /// Page fetch jobs that reached the backing store and succeeded.
    pub pages_fetched: u64,
    /// Page fetch jobs whose query failed; the page was left empty.
    pub pages_failed: u64,
    pub count_queries: u64,
    pub id_scans: u64,
    /// Results (pages, counts, id lists) dropped because a reset happened
    /// while they were in flight or queued.
    pub stale_discards: u64,
}

/// Shared, lock-free cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    row_hits: AtomicU64,
    row_misses: AtomicU64,
    pages_requested: AtomicU64,
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    count_queries: AtomicU64,
    id_scans: AtomicU64,
    stale_discards: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_row_hit(&self) {
        self.row_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_row_miss(&self) {
        self.row_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_requested(&self) {
        self.pages_requested.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_page_requests_total").increment(1);
    }

    pub(crate) fn record_page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_page_fetches_total", "outcome" => "ok").increment(1);
    }

    pub(crate) fn record_page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_page_fetches_total", "outcome" => "error").increment(1);
    }

    pub(crate) fn record_count_query(&self) {
        self.count_queries.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_count_queries_total").increment(1);
    }

    pub(crate) fn record_id_scan(&self) {
        self.id_scans.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_id_scans_total").increment(1);
    }

    pub(crate) fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
        counter!("lazygrid_stale_discards_total").increment(1);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            row_hits: self.row_hits.load(Ordering::Relaxed),
            row_misses: self.row_misses.load(Ordering::Relaxed),
            pages_requested: self.pages_requested.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            count_queries: self.count_queries.load(Ordering::Relaxed),
            id_scans: self.id_scans.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let stats = CacheStats::new();
        stats.record_row_hit();
        stats.record_row_miss();
        stats.record_row_miss();
        stats.record_page_requested();
        stats.record_page_failed();
        stats.record_stale_discard();

        let snap = stats.snapshot();
        assert_eq!(snap.row_hits, 1);
        assert_eq!(snap.row_misses, 2);
        assert_eq!(snap.pages_requested, 1);
        assert_eq!(snap.pages_fetched, 0);
        assert_eq!(snap.pages_failed, 1);
        assert_eq!(snap.stale_discards, 1);
    }
}
