//! Failure taxonomy for loading a catalog spreadsheet.
//!
//! Every variant maps to a distinct, human-readable message and a stable
//! machine code so the CLI and HTTP surfaces can tell a wrong URL apart from
//! a malformed workbook or a drifted header.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LookupError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Transport failure or non-2xx response while fetching the spreadsheet.
    #[error("could not retrieve the spreadsheet: {0}")]
    Retrieval(String),

    /// The bytes are not a readable spreadsheet container, or it has no sheets.
    #[error("the spreadsheet could not be decoded: {0}")]
    Decode(String),

    /// The selected sheet produced zero rows.
    #[error("the spreadsheet has no rows")]
    EmptyDocument,

    /// No sheet in the workbook contains a non-empty row.
    #[error("no sheet in the spreadsheet contains data")]
    NoUsableSheet,

    #[error("no header row with an identifier column (e.g. SAP) in the first {scanned} rows")]
    HeaderNotFound { scanned: usize },

    #[error("header row {header_row} has no category columns")]
    NoCategoryColumns { header_row: usize },
}

impl LookupError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::Retrieval(_) => "retrieval_error",
            LookupError::Decode(_) => "decode_error",
            LookupError::EmptyDocument => "empty_document",
            LookupError::NoUsableSheet => "no_usable_sheet",
            LookupError::HeaderNotFound { .. } => "header_not_found",
            LookupError::NoCategoryColumns { .. } => "no_category_columns",
        }
    }

    /// True for failures caused by the network rather than the content.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, LookupError::Retrieval(_))
    }
}
