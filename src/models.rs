//! Core data types that flow through the lookup pipeline.
//!
//! A [`Grid`] comes out of the loader, the header resolver turns it into a
//! [`HeaderLayout`], and the index builder produces a [`LookupIndex`] plus a
//! [`CategoryList`]. Queries yield a [`QueryResult`], and found references
//! become a [`ResolvedUrl`]. All of these are immutable once built.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Rows of text cells decoded from one sheet. Blank cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text at `(row, col)`, or `""` when out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// True if at least one row has a non-blank cell.
    pub fn has_content(&self) -> bool {
        self.rows.iter().any(|r| !row_is_blank(r))
    }
}

impl From<Vec<Vec<&str>>> for Grid {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Grid::new(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

pub(crate) fn row_is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// A category column as found in the header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryColumn {
    /// Header text as authored (trimmed), e.g. `"GALLETAS"`.
    pub display_name: String,
    pub position: usize,
}

/// Where the header, identifier and category columns live in a [`Grid`].
///
/// Invariants: `categories` is non-empty and never contains
/// `identifier_column`; `header_row` is within the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderLayout {
    pub header_row: usize,
    pub identifier_column: usize,
    pub categories: Vec<CategoryColumn>,
}

/// Normalized identifier → (category display name → raw document reference).
///
/// Every identifier present maps to at least one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupIndex {
    entries: HashMap<String, HashMap<String, String>>,
}

impl LookupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, identifier: String, category: String, reference: String) {
        self.entries
            .entry(identifier)
            .or_default()
            .insert(category, reference);
    }

    /// Categories recorded for a normalized identifier.
    pub fn get(&self, identifier: &str) -> Option<&HashMap<String, String>> {
        self.entries.get(identifier)
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (identifier, category) entries.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }
}

/// Unique category display names in stable presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryList(Vec<String>);

impl CategoryList {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a query. Only `Found` carries a document reference; the other
/// variants are informational, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Found { document_reference: String },
    NotFoundIdentifier,
    NotFoundCategory,
    EmptyInput,
}

impl QueryResult {
    pub fn code(&self) -> &'static str {
        match self {
            QueryResult::Found { .. } => "found",
            QueryResult::NotFoundIdentifier => "not_found_identifier",
            QueryResult::NotFoundCategory => "not_found_category",
            QueryResult::EmptyInput => "empty_input",
        }
    }

    /// User-facing message, distinct per outcome.
    pub fn message(&self) -> String {
        match self {
            QueryResult::Found { document_reference } => {
                format!("Document: {}", document_reference)
            }
            QueryResult::NotFoundIdentifier => "No entry for that SAP code.".to_string(),
            QueryResult::NotFoundCategory => {
                "No document for that category; select one of the listed categories.".to_string()
            }
            QueryResult::EmptyInput => "Enter a SAP code.".to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found { .. })
    }
}

/// A retrievable document URL: base location plus encoded filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    /// Final filename before encoding, with the `.pdf` suffix enforced.
    pub filename: String,
    pub url: String,
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
