use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Ordered tuple of row-key values; the join key across datasets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(Vec<Value>);

impl RowKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for RowKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (pos, value) in self.0.iter().enumerate() {
            if pos > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

/// First and last row key of a partition (both inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBounds {
    pub first: RowKey,
    pub last: RowKey,
}

impl KeyBounds {
    pub fn new(first: RowKey, last: RowKey) -> Self {
        Self { first, last }
    }
}

/// Half-open key range `[start, end)`; `None` means unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Option<RowKey>,
    pub end: Option<RowKey>,
}

impl KeyRange {
    pub fn new(start: Option<RowKey>, end: Option<RowKey>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        let after_start = self.start.as_ref().is_none_or(|start| key >= start);
        let before_end = self.end.as_ref().is_none_or(|end| key < end);
        after_start && before_end
    }

    /// Returns true if any key within `bounds` may fall inside this range.
    pub fn overlaps(&self, bounds: &KeyBounds) -> bool {
        let starts_before_end = self.end.as_ref().is_none_or(|end| bounds.first < *end);
        let ends_after_start = self
            .start
            .as_ref()
            .is_none_or(|start| bounds.last >= *start);
        starts_before_end && ends_after_start
    }

    /// Returns true if the two half-open ranges may share a key.
    pub fn intersects(&self, other: &KeyRange) -> bool {
        let below = |start: &Option<RowKey>, end: &Option<RowKey>| match (start, end) {
            (Some(start), Some(end)) => start < end,
            _ => true,
        };
        below(&self.start, &other.end) && below(&other.start, &self.end)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            Some(start) => write!(f, "[{start}")?,
            None => f.write_str("[-inf")?,
        }
        match &self.end {
            Some(end) => write!(f, ", {end})"),
            None => f.write_str(", +inf)"),
        }
    }
}
