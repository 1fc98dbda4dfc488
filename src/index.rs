//! Lookup index construction.
//!
//! Data rows are the rows strictly below the header. Rows that are entirely
//! blank, or whose identifier normalizes to nothing, are skipped. Cell values
//! are stored trimmed but otherwise verbatim; `.pdf` enforcement happens in
//! [`crate::document_url`]. When two rows share an identifier, the later row
//! overwrites the earlier one per category (last write wins).

use crate::models::{row_is_blank, CategoryList, Grid, HeaderLayout, LookupIndex};
use crate::normalize::{normalize_header, normalize_identifier, IdentifierMode};

/// Builds the index and the sorted category list for a resolved layout.
pub fn build(
    grid: &Grid,
    layout: &HeaderLayout,
    mode: IdentifierMode,
) -> (LookupIndex, CategoryList) {
    let mut index = LookupIndex::new();

    for row in grid.rows().iter().skip(layout.header_row + 1) {
        if row_is_blank(row) {
            continue;
        }
        let identifier = normalize_identifier(
            row.get(layout.identifier_column)
                .map(String::as_str)
                .unwrap_or(""),
            mode,
        );
        if identifier.is_empty() {
            continue;
        }
        for column in &layout.categories {
            let value = row
                .get(column.position)
                .map(|v| v.trim())
                .unwrap_or("");
            if value.is_empty() {
                continue;
            }
            index.insert(
                identifier.clone(),
                column.display_name.clone(),
                value.to_string(),
            );
        }
    }

    (index, category_list(layout))
}

/// Category names sorted accent- and case-insensitively, ties by raw name.
pub fn category_list(layout: &HeaderLayout) -> CategoryList {
    let mut names: Vec<(String, String)> = layout
        .categories
        .iter()
        .map(|c| (normalize_header(&c.display_name), c.display_name.clone()))
        .collect();
    names.sort();
    names.dedup_by(|a, b| a.1 == b.1);
    CategoryList::new(names.into_iter().map(|(_, raw)| raw).collect())
}
