//! Cache settings and how they turn into a [`QueryPlanner`].

use lazygrid_core::{QueryPlanner, SortFieldTable, DEFAULT_ID_COLUMN, DEFAULT_SORT_COLUMN, PAGE_SIZE};
use serde::Deserialize;

/// Per-view cache configuration.
///
/// Controls page granularity, event fan-out, and the planner's fallback
/// ordering. Deserializable so views can keep it in their preference store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Rows fetched together per page.
    pub page_size: usize,
    /// Capacity of the broadcast channel carrying `CacheEvent`s. Slow
    /// subscribers skip events rather than stall the workers.
    pub event_capacity: usize,
    /// Backing column used when the sort spec is empty or unsortable.
    pub default_sort_column: String,
    /// Primary-key column, appended as the final ordering tie-breaker.
    pub id_column: String,
}

impl CacheConfig {
    /// Returns a copy with out-of-range values clamped.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.event_capacity = self.event_capacity.max(1);
        if self.default_sort_column.trim().is_empty() {
            self.default_sort_column = DEFAULT_SORT_COLUMN.to_string();
        }
        if self.id_column.trim().is_empty() {
            self.id_column = DEFAULT_ID_COLUMN.to_string();
        }
        self
    }

    /// Planner for the tour-book column table with this config's columns.
    #[must_use]
    pub fn planner(&self) -> QueryPlanner {
        QueryPlanner::new(
            SortFieldTable::tour_book(),
            self.default_sort_column.clone(),
            self.id_column.clone(),
        )
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            event_capacity: 256,
            default_sort_column: DEFAULT_SORT_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.default_sort_column, "TourStartTime");
        assert_eq!(config.id_column, "TourId");
    }

    #[test]
    fn normalized_clamps_zero_and_blank_values() {
        let config = CacheConfig {
            page_size: 0,
            event_capacity: 0,
            default_sort_column: " ".to_string(),
            id_column: String::new(),
        }
        .normalized();

        assert_eq!(config.page_size, 1);
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.default_sort_column, "TourStartTime");
        assert_eq!(config.id_column, "TourId");
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{ "page_size": 250 }"#).unwrap();
        assert_eq!(config.page_size, 250);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.id_column, "TourId");
    }

    #[test]
    fn planner_uses_configured_columns() {
        let config = CacheConfig {
            default_sort_column: "StartedAt".to_string(),
            id_column: "Id".to_string(),
            ..CacheConfig::default()
        };
        let order = config.planner().order_by(&lazygrid_core::SortSpec::default());
        assert_eq!(order.to_sql(), " ORDER BY StartedAt DESC, Id ASC");
    }
}
