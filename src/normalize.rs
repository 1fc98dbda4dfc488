//! Text normalization for header names and identifiers.
//!
//! Spreadsheets are authored by hand, so `Código SAP`, `CODIGO_SAP` and
//! `codigo sap ` must all compare equal. Both functions are pure and total.

use serde::Deserialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// How user-entered and spreadsheet identifiers are canonicalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierMode {
    /// Keep letters and digits (accents stripped, lowercased).
    #[default]
    Alphanumeric,
    /// Keep ASCII digits only.
    Digits,
}

/// Strip diacritics by decomposing and dropping combining marks.
fn fold_diacritics(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd().filter(|c| !is_combining_mark(*c))
}

/// Canonical form of a header cell: lowercase ASCII letters and digits only.
pub fn normalize_header(text: &str) -> String {
    fold_diacritics(text.trim())
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Canonical form of an identifier under the given mode.
pub fn normalize_identifier(text: &str, mode: IdentifierMode) -> String {
    let text = text.trim();
    match mode {
        IdentifierMode::Alphanumeric => fold_diacritics(text)
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect(),
        IdentifierMode::Digits => text.chars().filter(char::is_ascii_digit).collect(),
    }
}
