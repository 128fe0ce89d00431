//! Opaque filter token forwarded from the caller to the backing store.

use serde::{Deserialize, Serialize};

/// Positional parameter bound to a `?` placeholder in a [`FilterSpec`] clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Caller-supplied filter (tag filters, date ranges, ...).
///
/// The cache never looks inside; it hands the token to the planner, which
/// copies it verbatim into every query it builds. By convention `clause` is
/// appended after `WHERE 1=1`, so a non-empty clause starts with `AND`, and
/// each `?` placeholder in it is bound to the matching entry of `params`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    clause: String,
    params: Vec<FilterValue>,
}

impl FilterSpec {
    /// The "no filter" token.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(clause: impl Into<String>, params: Vec<FilterValue>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }

    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    #[must_use]
    pub fn params(&self) -> &[FilterValue] {
        &self.params
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.clause.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_no_filter() {
        assert!(FilterSpec::none().is_none());
        assert!(FilterSpec::new("   ", vec![]).is_none());
        assert!(!FilterSpec::new(" AND TourType = ?", vec![FilterValue::Int(1)]).is_none());
    }
}
