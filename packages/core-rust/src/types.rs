//! Row, id and value types shared by the planner and the cache.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a backing-store entity (its primary key).
///
/// Row positions change with every sort or filter change; a `RowId` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub i64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Generic column value as read from the backing store.
///
/// Mirrors the storage classes a relational store hands back: the cache never
/// interprets these, it only carries them to the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit IEEE 754 float.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used by in-memory sorting: `Null` first, then by kind,
    /// then by payload. Floats use `total_cmp`.
    #[must_use]
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::String(_) => 3,
                Value::Bytes(_) => 4,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Integers are exact up to 2^53, which covers every timestamp and counter we sort on.
            #[allow(clippy::cast_precision_loss)]
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// A materialized snapshot of one backing-store entity.
///
/// Carries the denormalized column values plus the one-to-many association
/// id sets (tags, markers) collected at fetch time. Rows are created only by a
/// page fetch and never mutated afterwards; the cache hands them out behind an
/// `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Primary key of the backing entity.
    pub id: RowId,
    /// Column values keyed by backing column name.
    pub values: BTreeMap<String, Value>,
    /// Ids of associated tags, ascending.
    pub tag_ids: Vec<i64>,
    /// Ids of associated markers, ascending.
    pub marker_ids: Vec<i64>,
}

impl Row {
    /// Creates a row with no column values and no associations.
    #[must_use]
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
            tag_ids: Vec::new(),
            marker_ids: Vec::new(),
        }
    }

    /// Builder-style setter for a single column value.
    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Builder-style setter for the tag id set. Ids are sorted and deduplicated.
    #[must_use]
    pub fn with_tags(mut self, mut tag_ids: Vec<i64>) -> Self {
        tag_ids.sort_unstable();
        tag_ids.dedup();
        self.tag_ids = tag_ids;
        self
    }

    /// Builder-style setter for the marker id set. Ids are sorted and deduplicated.
    #[must_use]
    pub fn with_markers(mut self, mut marker_ids: Vec<i64>) -> Self {
        marker_ids.sort_unstable();
        marker_ids.dedup();
        self.marker_ids = marker_ids;
        self
    }

    /// Looks up a column value by backing column name (case-insensitive, as
    /// the backing store treats identifiers).
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column).or_else(|| {
            self.values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
    }
}
