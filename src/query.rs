//! Query resolution against a built [`LookupIndex`].

use serde::Deserialize;

use crate::models::{CategoryList, LookupIndex, QueryResult};
use crate::normalize::{normalize_header, normalize_identifier, IdentifierMode};

/// What to do when no category is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCategoryPolicy {
    /// Answer `NotFoundCategory` and let the user pick one.
    #[default]
    Require,
    /// Use the identifier's first category in [`CategoryList`] order.
    FirstAvailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub identifier_mode: IdentifierMode,
    pub empty_category: EmptyCategoryPolicy,
}

/// Resolves raw user input to a document reference.
///
/// Categories are matched exactly first, then by normalized header form so
/// that `"Galletas"` still finds a column authored as `"GALLETAS"`.
pub fn resolve(
    index: &LookupIndex,
    categories: &CategoryList,
    raw_identifier: &str,
    raw_category: &str,
    options: &QueryOptions,
) -> QueryResult {
    let identifier = normalize_identifier(raw_identifier, options.identifier_mode);
    if identifier.is_empty() {
        return QueryResult::EmptyInput;
    }
    let Some(entry) = index.get(&identifier) else {
        return QueryResult::NotFoundIdentifier;
    };

    let category = raw_category.trim();
    let found = if category.is_empty() {
        match options.empty_category {
            EmptyCategoryPolicy::Require => None,
            EmptyCategoryPolicy::FirstAvailable => {
                categories.iter().find_map(|name| entry.get(name))
            }
        }
    } else {
        entry.get(category).or_else(|| {
            let wanted = normalize_header(category);
            // Walk the category list so the fallback is deterministic.
            categories
                .iter()
                .filter(|name| normalize_header(name) == wanted)
                .find_map(|name| entry.get(name))
        })
    };

    match found {
        Some(reference) => QueryResult::Found {
            document_reference: reference.clone(),
        },
        None => QueryResult::NotFoundCategory,
    }
}
