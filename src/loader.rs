//! Tabular loader: fetch a spreadsheet and decode it into a [`Grid`].
//!
//! Retrieval goes through the [`SpreadsheetSource`] trait so the catalog does
//! not care whether bytes come from an HTTP host or a local file. The fetch
//! is the only suspension point of a load; decoding and sheet selection run
//! synchronously afterwards.
//!
//! # Sheet selection
//!
//! The first sheet in workbook order that has at least one non-blank row is
//! used. If every sheet is completely empty the load fails with
//! [`LookupError::EmptyDocument`]; if some sheets have rows but all of them
//! are blank it fails with [`LookupError::NoUsableSheet`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{LookupError, Result};
use crate::models::Grid;
use crate::xlsx::{Workbook, MIME_XLSX};

/// A place spreadsheet bytes can be fetched from.
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Human-readable location, used in logs and status output.
    fn location(&self) -> String;

    /// Retrieves the raw spreadsheet bytes.
    async fn fetch(&self) -> Result<Vec<u8>>;
}

/// Largest response body accepted from an HTTP source.
pub const MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Fetches over HTTP(S) with a plain `GET`.
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("sap-lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LookupError::Retrieval(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            max_bytes: MAX_DOWNLOAD_BYTES,
        })
    }

    /// Overrides the response body limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self) -> LookupError {
        LookupError::Retrieval(format!(
            "response from {} exceeds size limit ({} bytes)",
            self.url, self.max_bytes
        ))
    }
}

#[async_trait]
impl SpreadsheetSource for HttpSource {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let mut resp = self
            .client
            .get(&self.url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::ACCEPT, format!("{}, */*", MIME_XLSX))
            .send()
            .await
            .map_err(|e| LookupError::Retrieval(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Retrieval(format!(
                "HTTP {} from {}",
                status, self.url
            )));
        }

        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large());
        }
        let mut out = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| LookupError::Retrieval(e.to_string()))?
        {
            if (out.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large());
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Reads a workbook from the local filesystem.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SpreadsheetSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| LookupError::Retrieval(format!("{}: {}", self.path.display(), e)))
    }
}

/// Picks a source for a location string: `http(s)://` URLs go over the
/// network, anything else (optionally `file://`-prefixed) is a local path.
pub fn source_for(location: &str, timeout_secs: u64) -> Result<Box<dyn SpreadsheetSource>> {
    let trimmed = location.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(Box::new(HttpSource::new(trimmed, timeout_secs)?))
    } else {
        let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        Ok(Box::new(FileSource::new(path)))
    }
}

/// A decoded sheet plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub sheet_name: String,
    pub grid: Grid,
    /// Hex SHA-256 of the fetched bytes.
    pub content_hash: String,
}

/// Fetches and decodes the spreadsheet behind `source`.
pub async fn load(source: &dyn SpreadsheetSource) -> Result<LoadedSheet> {
    let bytes = source.fetch().await?;
    tracing::debug!(
        location = %source.location(),
        bytes = bytes.len(),
        "spreadsheet fetched"
    );
    let content_hash = hex::encode(Sha256::digest(&bytes));
    let (sheet_name, grid) = decode_grid(&bytes)?;
    tracing::info!(sheet = %sheet_name, rows = grid.len(), "sheet selected");
    Ok(LoadedSheet {
        sheet_name,
        grid,
        content_hash,
    })
}

/// Decodes a workbook and returns the first sheet with a non-blank row.
pub fn decode_grid(bytes: &[u8]) -> Result<(String, Grid)> {
    let mut workbook = Workbook::open(bytes)?;
    let sheets = workbook.sheets().to_vec();
    let mut any_rows = false;
    for sheet in &sheets {
        let grid = workbook.read_sheet(sheet)?;
        if grid.has_content() {
            return Ok((sheet.name.clone(), grid));
        }
        if !grid.is_empty() {
            any_rows = true;
        }
        tracing::debug!(sheet = %sheet.name, "skipping sheet without data");
    }
    if any_rows {
        Err(LookupError::NoUsableSheet)
    } else {
        Err(LookupError::EmptyDocument)
    }
}
