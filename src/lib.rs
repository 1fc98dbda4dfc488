//! # SAP Lookup
//!
//! Resolves SAP codes to layout documents using a spreadsheet that is
//! maintained by hand and therefore loosely structured: the header row can
//! sit anywhere in the first rows, column names vary in case, accents and
//! spacing, and identifiers are typed with stray punctuation.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  Loader  │──▶│  Header  │──▶│  Index   │──▶│  Query   │──▶│ Doc URL  │
//! │ xlsx→Grid│   │ detection│   │ SAP→cat→d│   │ resolver │   │ builder  │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! [`catalog::Catalog`] owns the current snapshot and swaps it atomically on
//! reload; the CLI and the HTTP server both query through it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed failures with stable codes |
//! | [`normalize`] | Header and identifier normalization |
//! | [`xlsx`] | OOXML workbook decoding |
//! | [`loader`] | Spreadsheet retrieval and grid selection |
//! | [`header`] | Header row and column detection |
//! | [`index`] | Lookup index construction |
//! | [`query`] | Query resolution |
//! | [`document_url`] | Document filename and URL construction |
//! | [`catalog`] | Snapshot ownership and reload |
//! | [`server`] | HTTP query surface |

pub mod catalog;
pub mod config;
pub mod document_url;
pub mod error;
pub mod header;
pub mod index;
pub mod loader;
pub mod logging;
pub mod lookup_cmd;
pub mod models;
pub mod normalize;
pub mod query;
pub mod server;
pub mod xlsx;
