//! Thread-safe row storage for one virtualized view.
//!
//! [`RowCache`] owns every piece of fetched data: position -> row,
//! id -> position, which pages have completed, the total count, and the
//! full ordered id list. It also owns the generation counter, because the
//! "is this result still current?" check must be atomic with the write it
//! guards.

use std::sync::Arc;

use dashmap::DashMap;
use lazygrid_core::{FetchKey, Generation, Row, RowId};
use parking_lot::RwLock;

/// Position-indexed row storage with generation-gated writes.
///
/// Reads (`get`, `id_to_position`, ...) go straight to [`DashMap`] shards and
/// never wait for the generation gate. Writers from the workers hold the gate
/// shared while they check the generation and insert, and [`RowCache::reset`]
/// holds it exclusively while clearing, so a stale write can never land after
/// a reset has started.
pub struct RowCache {
    generation: RwLock<Generation>,
    rows: DashMap<usize, Arc<Row>>,
    positions: DashMap<RowId, usize>,
    /// Fetch key -> number of rows the fetch produced (0 for failed pages).
    fetched_pages: DashMap<FetchKey, usize>,
    total_count: RwLock<Option<usize>>,
    id_list: RwLock<Option<Arc<Vec<RowId>>>>,
}

impl RowCache {
    /// Creates an empty cache at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: RwLock::new(0),
            rows: DashMap::new(),
            positions: DashMap::new(),
            fetched_pages: DashMap::new(),
            total_count: RwLock::new(None),
            id_list: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        *self.generation.read()
    }

    /// Returns the row at `position`, if its page has been fetched.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<Arc<Row>> {
        self.rows.get(&position).map(|r| Arc::clone(r.value()))
    }

    /// Bulk-inserts one page of rows at consecutive positions from `offset`
    /// and marks `fetch_key` fetched.
    ///
    /// Existing entries are never overwritten within a generation. Returns
    /// `false` and leaves the cache untouched if `generation` is stale.
    pub fn put(
        &self,
        fetch_key: FetchKey,
        offset: usize,
        rows: Vec<Row>,
        generation: Generation,
    ) -> bool {
        let current = self.generation.read();
        if *current != generation {
            return false;
        }

        let count = rows.len();
        for (i, row) in rows.into_iter().enumerate() {
            let position = offset + i;
            let id = row.id;
            self.rows.entry(position).or_insert_with(|| Arc::new(row));
            self.positions.insert(id, position);
        }
        // Marked last: a concurrent request that misses the pending set must
        // already see the rows.
        self.fetched_pages.insert(fetch_key, count);
        true
    }

    /// Runs `f` only if `generation` is current, holding the generation gate
    /// shared so no reset can start until `f` returns.
    ///
    /// `f` must not call back into methods that take the gate.
    pub fn if_current<R>(&self, generation: Generation, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.generation.read();
        (*current == generation).then(f)
    }

    /// Position of a row id already known to this generation, either from a
    /// fetched page or from the full id scan.
    #[must_use]
    pub fn id_to_position(&self, id: RowId) -> Option<usize> {
        self.positions.get(&id).map(|p| *p)
    }

    #[must_use]
    pub fn is_page_fetched(&self, fetch_key: FetchKey) -> bool {
        self.fetched_pages.contains_key(&fetch_key)
    }

    /// Number of rows a completed page produced.
    #[must_use]
    pub fn fetched_page_len(&self, fetch_key: FetchKey) -> Option<usize> {
        self.fetched_pages.get(&fetch_key).map(|n| *n)
    }

    /// Cached total row count, `None` until the count query completes.
    #[must_use]
    pub fn total_count(&self) -> Option<usize> {
        *self.total_count.read()
    }

    /// Stores the total count. Returns `false` if `generation` is stale.
    pub fn set_total_count(&self, count: usize, generation: Generation) -> bool {
        let current = self.generation.read();
        if *current != generation {
            return false;
        }
        *self.total_count.write() = Some(count);
        true
    }

    /// Full ordered id list, if it has been scanned for `generation`.
    #[must_use]
    pub fn id_list(&self, generation: Generation) -> Option<Arc<Vec<RowId>>> {
        let current = self.generation.read();
        if *current != generation {
            return None;
        }
        self.id_list.read().clone()
    }

    /// Stores the full ordered id list and indexes every id's position.
    /// Returns `false` and leaves the cache untouched if `generation` is stale.
    pub fn store_id_list(&self, ids: Arc<Vec<RowId>>, generation: Generation) -> bool {
        let current = self.generation.read();
        if *current != generation {
            return false;
        }
        for (position, id) in ids.iter().enumerate() {
            self.positions.insert(*id, position);
        }
        *self.id_list.write() = Some(ids);
        true
    }

    /// Id of the row at `position`: from the fetched row if present,
    /// otherwise from the scanned id list.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<RowId> {
        if let Some(row) = self.rows.get(&position) {
            return Some(row.id);
        }
        self.id_list
            .read()
            .as_ref()
            .and_then(|ids| ids.get(position).copied())
    }

    /// Number of materialized rows currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drops every row, position, page mark, count and id list, and starts
    /// a new generation. Returns the new generation.
    pub fn reset(&self) -> Generation {
        let mut current = self.generation.write();
        self.rows.clear();
        self.positions.clear();
        self.fetched_pages.clear();
        *self.total_count.write() = None;
        *self.id_list.write() = None;
        *current += 1;
        *current
    }
}

impl Default for RowCache {
    fn default() -> Self {
        Self::new()
    }
}
