//! Sort specification handed from the grid to the cache.

use serde::{Deserialize, Serialize};

/// Direction of one sort column as the grid header reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
    /// Column is part of the header state but not sorted. Dropped before planning.
    None,
}

impl SortDirection {
    /// SQL keyword for this direction, or `None` for an unsorted column.
    #[must_use]
    pub fn sql_keyword(self) -> Option<&'static str> {
        match self {
            SortDirection::Ascending => Some("ASC"),
            SortDirection::Descending => Some("DESC"),
            SortDirection::None => None,
        }
    }
}

/// One `(field id, direction)` entry of a [`SortSpec`].
///
/// `field_id` is the grid's column identifier, not a backing column name; the
/// [`QueryPlanner`](crate::QueryPlanner) maps it through a
/// [`SortFieldTable`](crate::SortFieldTable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field_id: String,
    pub direction: SortDirection,
}

impl SortField {
    #[must_use]
    pub fn new(field_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field_id: field_id.into(),
            direction,
        }
    }

    #[must_use]
    pub fn ascending(field_id: impl Into<String>) -> Self {
        Self::new(field_id, SortDirection::Ascending)
    }

    #[must_use]
    pub fn descending(field_id: impl Into<String>) -> Self {
        Self::new(field_id, SortDirection::Descending)
    }
}

/// Ordered list of sort fields; the first entry is the primary sort key.
///
/// An empty spec is valid and means "default ordering".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    #[must_use]
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    /// All entries, including unsorted (`SortDirection::None`) ones.
    #[must_use]
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Entries that actually contribute to ordering.
    pub fn active(&self) -> impl Iterator<Item = &SortField> {
        self.fields
            .iter()
            .filter(|f| f.direction != SortDirection::None)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }
}

impl From<Vec<SortField>> for SortSpec {
    fn from(fields: Vec<SortField>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_skips_unsorted_entries() {
        let spec = SortSpec::new(vec![
            SortField::new("TOUR_TITLE", SortDirection::None),
            SortField::descending("TIME_DATE"),
        ]);

        let active: Vec<_> = spec.active().map(|f| f.field_id.as_str()).collect();
        assert_eq!(active, vec!["TIME_DATE"]);
        assert!(!spec.is_empty());
    }

    #[test]
    fn spec_with_only_unsorted_entries_is_empty() {
        let spec = SortSpec::new(vec![SortField::new("TOUR_TITLE", SortDirection::None)]);
        assert!(spec.is_empty());
        assert!(SortSpec::default().is_empty());
    }

    #[test]
    fn sort_spec_serde_round_trip_keeps_order() {
        let spec = SortSpec::new(vec![
            SortField::ascending("TOUR_TITLE"),
            SortField::descending("TIME_DATE"),
        ]);
        let json = serde_json::to_string(&spec).unwrap();
        let back: SortSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
