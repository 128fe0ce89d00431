//! Query planner: turns a sort spec and a filter token into the three
//! backing-store queries the cache needs.
//!
//! Planning is pure and deterministic: identical `(sort, filter)` inputs
//! always yield byte-identical queries, which is what makes "one fetch per
//! page per generation" meaningful. Planning never fails; sort fields the
//! store cannot order by are replaced with the default ordering column.

use std::fmt::Write as _;

use tracing::debug;

use crate::fields::{SortFieldTable, SqlField};
use crate::filter::FilterSpec;
use crate::sort::{SortDirection, SortSpec};

/// Column used when a sort spec is empty or names an unsortable field.
pub const DEFAULT_SORT_COLUMN: &str = "TourStartTime";

/// Primary-key column, used as the final tie-breaker.
pub const DEFAULT_ID_COLUMN: &str = "TourId";

/// One resolved `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderTerm {
    /// Backing column name or expression.
    pub column: String,
    pub descending: bool,
}

impl OrderTerm {
    #[must_use]
    pub fn direction_sql(&self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }
}

/// A fully resolved, never-empty ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    terms: Vec<OrderTerm>,
}

impl OrderBy {
    #[must_use]
    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    /// Renders the ` ORDER BY a DESC, b ASC` fragment (leading space included).
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut sql = String::from(" ORDER BY ");
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} {}", term.column, term.direction_sql());
        }
        sql
    }
}

/// Counts all rows matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub filter: FilterSpec,
}

/// Loads every matching id in sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct IdListQuery {
    pub order_by: OrderBy,
    pub filter: FilterSpec,
}

/// Loads one page of fully materialized rows in sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub order_by: OrderBy,
    pub filter: FilterSpec,
    pub offset: usize,
    pub limit: usize,
}

/// Builds backing-store queries from grid sort/filter state.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    fields: SortFieldTable,
    default_column: String,
    id_column: String,
}

impl QueryPlanner {
    #[must_use]
    pub fn new(
        fields: SortFieldTable,
        default_column: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        Self {
            fields,
            default_column: default_column.into(),
            id_column: id_column.into(),
        }
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    #[must_use]
    pub fn build_count_query(&self, filter: &FilterSpec) -> CountQuery {
        CountQuery {
            filter: filter.clone(),
        }
    }

    #[must_use]
    pub fn build_id_list_query(&self, sort: &SortSpec, filter: &FilterSpec) -> IdListQuery {
        IdListQuery {
            order_by: self.order_by(sort),
            filter: filter.clone(),
        }
    }

    #[must_use]
    pub fn build_page_query(
        &self,
        sort: &SortSpec,
        filter: &FilterSpec,
        offset: usize,
        limit: usize,
    ) -> PageQuery {
        PageQuery {
            order_by: self.order_by(sort),
            filter: filter.clone(),
            offset,
            limit,
        }
    }

    /// Resolves a sort spec into backing columns.
    ///
    /// - `SortDirection::None` entries are dropped.
    /// - Unsortable or unknown field ids fall back to the default column.
    /// - A column that already appeared is not repeated.
    /// - An empty result becomes `default_column DESC`.
    /// - The id column is appended ascending so paging is stable across
    ///   rows with equal sort keys.
    #[must_use]
    pub fn order_by(&self, sort: &SortSpec) -> OrderBy {
        let mut terms: Vec<OrderTerm> = Vec::new();

        for field in sort.active() {
            let column = match self.fields.lookup(&field.field_id) {
                SqlField::Column(column) => column,
                SqlField::Unsortable => {
                    debug!(
                        field_id = %field.field_id,
                        fallback = %self.default_column,
                        "sort field cannot be ordered by, using default column"
                    );
                    self.default_column.as_str()
                }
            };

            if terms.iter().any(|t| t.column.eq_ignore_ascii_case(column)) {
                continue;
            }
            terms.push(OrderTerm {
                column: column.to_string(),
                descending: field.direction == SortDirection::Descending,
            });
        }

        if terms.is_empty() {
            terms.push(OrderTerm {
                column: self.default_column.clone(),
                descending: true,
            });
        }

        if !terms
            .iter()
            .any(|t| t.column.eq_ignore_ascii_case(&self.id_column))
        {
            terms.push(OrderTerm {
                column: self.id_column.clone(),
                descending: false,
            });
        }

        OrderBy { terms }
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(
            SortFieldTable::tour_book(),
            DEFAULT_SORT_COLUMN,
            DEFAULT_ID_COLUMN,
        )
    }
}
