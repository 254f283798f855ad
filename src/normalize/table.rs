//! Tabular output model shared by every record kind.

use std::collections::{HashMap, HashSet};

/// The identity column heading every table leads with.
pub const IDENTITY_COLUMN: &str = "name";

/// Insertion-ordered, deduplicating column collector.
///
/// Dynamic column sets (score-sheet subjects) must keep first-seen order
/// rather than rely on map iteration order, so the order is tracked
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set seeded with the identity column.
    #[must_use]
    pub fn with_identity() -> Self {
        let mut columns = Self::new();
        columns.insert(IDENTITY_COLUMN);
        columns
    }

    /// Insert a column, keeping first-seen order. Returns `false` for
    /// duplicates.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consume into the ordered column list.
    #[must_use]
    pub fn into_columns(self) -> Vec<String> {
        self.order
    }
}

/// A normalized table: ordered columns, ordered rows, suggested output
/// name.
///
/// Every row's key set is a subset of `columns`; a row may omit declared
/// columns (blank cells) but never introduces new ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Ordered column headings, identity column first.
    pub columns: Vec<String>,
    /// Ordered rows mapping column heading to cell value.
    pub rows: Vec<HashMap<String, String>>,
    /// Suggested base file name for the export sink.
    pub file_stem: String,
}

impl Table {
    /// Create an empty table over the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>, file_stem: impl Into<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            file_stem: file_stem.into(),
        }
    }

    /// Append a row, dropping any key that is not a declared column so
    /// the subset invariant holds no matter what the normalizer hands in.
    pub fn push_row(&mut self, row: HashMap<String, String>) {
        let filtered = row
            .into_iter()
            .filter(|(key, _)| self.columns.iter().any(|c| c == key))
            .collect();
        self.rows.push(filtered);
    }

    /// Cell value at (row, column); empty string for omitted cells.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }
}
