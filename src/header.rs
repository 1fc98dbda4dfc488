//! Header and column detection.
//!
//! Rows are scanned from the top, up to a bounded limit, for the first row
//! containing an identifier alias (`SAP`, `Código`, ...). That row becomes
//! the header; its identifier cell fixes the identifier column and the
//! configured [`ColumnDetectionPolicy`] decides which other columns are
//! categories.

use serde::Deserialize;

use crate::error::{LookupError, Result};
use crate::models::{CategoryColumn, Grid, HeaderLayout};
use crate::normalize::normalize_header;

pub const DEFAULT_IDENTIFIER_ALIASES: &[&str] = &["sap", "codigo", "codigosap", "sku", "id"];
pub const DEFAULT_CATEGORY_ALIASES: &[&str] = &["categoria", "category", "tipo", "grupo"];
pub const DEFAULT_SCAN_LIMIT: usize = 50;

/// Metadata columns that the residual policy never treats as categories.
pub const DEFAULT_EXCLUDED_HEADERS: &[&str] = &[
    "region",
    "zona",
    "zone",
    "tipotienda",
    "storetype",
    "canal",
    "cadena",
    "tienda",
    "descripcion",
    "description",
    "nombre",
    "producto",
];

/// Policy name as written in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Residual,
    Alias,
    Manual,
}

/// How category columns are picked out of the header row.
///
/// All header comparisons use [`normalize_header`] forms; the stored lists
/// are normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDetectionPolicy {
    /// Columns whose header equals an alias or contains a keyword.
    Alias {
        aliases: Vec<String>,
        keywords: Vec<String>,
    },
    /// Every non-empty header except the identifier, identifier aliases and
    /// the exclusion set.
    Residual { exclude: Vec<String> },
    /// Exactly the listed headers, in the listed order.
    Manual { columns: Vec<String> },
}

fn normalized_set<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|s| normalize_header(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect();
    out.dedup();
    out
}

impl ColumnDetectionPolicy {
    pub fn alias<S: AsRef<str>>(aliases: &[S], keywords: &[S]) -> Self {
        Self::Alias {
            aliases: normalized_set(aliases),
            keywords: normalized_set(keywords),
        }
    }

    pub fn residual<S: AsRef<str>>(exclude: &[S]) -> Self {
        Self::Residual {
            exclude: normalized_set(exclude),
        }
    }

    pub fn manual<S: AsRef<str>>(columns: &[S]) -> Self {
        Self::Manual {
            columns: normalized_set(columns),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Alias { .. } => PolicyKind::Alias,
            Self::Residual { .. } => PolicyKind::Residual,
            Self::Manual { .. } => PolicyKind::Manual,
        }
    }

    /// Category columns in `header`, skipping `identifier_column`.
    ///
    /// `identifier_aliases` must already be normalized.
    fn detect(
        &self,
        header: &[String],
        identifier_column: usize,
        identifier_aliases: &[String],
    ) -> Vec<CategoryColumn> {
        let candidates = header
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != identifier_column)
            .map(|(pos, raw)| (pos, raw.trim(), normalize_header(raw)))
            .filter(|(_, display, _)| !display.is_empty());

        let picked: Vec<(usize, &str)> = match self {
            Self::Alias { aliases, keywords } => candidates
                .filter(|(_, _, norm)| {
                    aliases.iter().any(|a| a == norm)
                        || keywords.iter().any(|k| norm.contains(k.as_str()))
                })
                .map(|(pos, display, _)| (pos, display))
                .collect(),
            Self::Residual { exclude } => candidates
                .filter(|(_, _, norm)| {
                    !exclude.contains(norm) && !identifier_aliases.contains(norm)
                })
                .map(|(pos, display, _)| (pos, display))
                .collect(),
            Self::Manual { columns } => {
                let candidates: Vec<_> = candidates.collect();
                columns
                    .iter()
                    .filter_map(|wanted| {
                        let found = candidates.iter().find(|(_, _, norm)| norm == wanted);
                        if found.is_none() {
                            tracing::warn!(column = %wanted, "configured category column not in header");
                        }
                        found.map(|(pos, display, _)| (*pos, *display))
                    })
                    .collect()
            }
        };

        let mut out: Vec<CategoryColumn> = Vec::with_capacity(picked.len());
        for (position, display) in picked {
            if out.iter().any(|c| c.display_name == display) {
                continue;
            }
            out.push(CategoryColumn {
                display_name: display.to_string(),
                position,
            });
        }
        out
    }
}

impl Default for ColumnDetectionPolicy {
    fn default() -> Self {
        Self::residual(DEFAULT_EXCLUDED_HEADERS)
    }
}

/// Everything the resolver needs to find the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRules {
    identifier_aliases: Vec<String>,
    scan_limit: usize,
    policy: ColumnDetectionPolicy,
}

impl HeaderRules {
    pub fn new<S: AsRef<str>>(
        identifier_aliases: &[S],
        scan_limit: usize,
        policy: ColumnDetectionPolicy,
    ) -> Self {
        Self {
            identifier_aliases: normalized_set(identifier_aliases),
            scan_limit: scan_limit.max(1),
            policy,
        }
    }

    pub fn identifier_aliases(&self) -> &[String] {
        &self.identifier_aliases
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    pub fn policy(&self) -> &ColumnDetectionPolicy {
        &self.policy
    }
}

impl Default for HeaderRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_IDENTIFIER_ALIASES,
            DEFAULT_SCAN_LIMIT,
            ColumnDetectionPolicy::default(),
        )
    }
}

/// Locates the header row and classifies its columns.
///
/// Only the first `min(grid.len(), scan_limit)` rows are examined. The
/// first row with a cell equal to an identifier alias wins, and within it
/// the leftmost matching cell is the identifier column.
pub fn resolve(grid: &Grid, rules: &HeaderRules) -> Result<HeaderLayout> {
    let scanned = grid.len().min(rules.scan_limit);

    for (row_idx, row) in grid.rows().iter().take(scanned).enumerate() {
        let identifier_column = row.iter().position(|cell| {
            let norm = normalize_header(cell);
            !norm.is_empty() && rules.identifier_aliases.contains(&norm)
        });
        let Some(identifier_column) = identifier_column else {
            continue;
        };

        let categories = rules
            .policy
            .detect(row, identifier_column, &rules.identifier_aliases);
        if categories.is_empty() {
            return Err(LookupError::NoCategoryColumns {
                header_row: row_idx,
            });
        }

        tracing::debug!(
            header_row = row_idx,
            identifier_column,
            categories = ?categories.iter().map(|c| c.display_name.as_str()).collect::<Vec<_>>(),
            "header resolved"
        );
        return Ok(HeaderLayout {
            header_row: row_idx,
            identifier_column,
            categories,
        });
    }

    Err(LookupError::HeaderNotFound { scanned })
}
