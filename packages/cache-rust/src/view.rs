//! Snapshot of the sort/filter state a generation was started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use lazygrid_core::{FilterSpec, Generation, SortSpec};

/// Immutable view parameters for one generation.
///
/// Jobs capture the `Arc<ViewState>` current at scheduling time, so a job
/// always queries with the sort and filter of the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub generation: Generation,
    pub sort: SortSpec,
    pub filter: FilterSpec,
}

/// Lock-free handle to the current [`ViewState`], shared by the provider
/// (the only writer) and both workers.
pub type SharedView = Arc<ArcSwap<ViewState>>;

#[must_use]
pub fn shared_view(initial: ViewState) -> SharedView {
    Arc::new(ArcSwap::from_pointee(initial))
}
