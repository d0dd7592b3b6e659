//! Scanned table rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single record read from the source table.
///
/// Columns are addressed as `family:qualifier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// The row key.
    pub key: String,
    /// Column values keyed by `family:qualifier`.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

impl Row {
    /// Create an empty row with the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Add a column value.
    pub fn with_column(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// Look up a column value.
    pub fn column(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}
