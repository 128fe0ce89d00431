//! `LazyGrid` Core — row types, sort/filter specs, page arithmetic, and the query planner.
//!
//! Everything here is pure: no threads, no I/O. The runtime half of the
//! cache lives in `lazygrid-cache`.

pub mod fields;
pub mod filter;
pub mod page;
pub mod query;
pub mod sort;
pub mod types;

pub use fields::{SortFieldTable, SqlField, TOUR_BOOK_SORT_FIELDS};
pub use filter::{FilterSpec, FilterValue};
pub use page::{
    fetch_key, page_offset, page_range, pages_overlapping, FetchKey, Generation, PageState,
    PAGE_SIZE,
};
pub use query::{
    CountQuery, IdListQuery, OrderBy, OrderTerm, PageQuery, QueryPlanner, DEFAULT_ID_COLUMN,
    DEFAULT_SORT_COLUMN,
};
pub use sort::{SortDirection, SortField, SortSpec};
pub use types::{Row, RowId, Value};
