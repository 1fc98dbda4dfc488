//! The live catalog: the most recent successfully built index, swapped in
//! whole.
//!
//! # Concurrency
//!
//! Each [`Catalog::reload`] takes a generation number before it starts
//! fetching. When the load finishes, its outcome (success or failure) is
//! applied only if no newer generation has been applied in the meantime;
//! otherwise it is dropped. Readers clone an `Arc<Snapshot>` under a short
//! read lock, so a query always sees one complete index and never a
//! half-built one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::document_url;
use crate::error::Result;
use crate::header::{self, HeaderRules};
use crate::index;
use crate::loader::{self, LoadedSheet, SpreadsheetSource};
use crate::models::{CategoryList, HeaderLayout, LookupIndex, QueryResult, ResolvedUrl};
use crate::query::{self, QueryOptions};

/// One fully built, immutable catalog.
#[derive(Debug)]
pub struct Snapshot {
    pub index: LookupIndex,
    pub categories: CategoryList,
    pub layout: HeaderLayout,
    pub sheet_name: String,
    /// Rows below the header, blank ones included.
    pub data_rows: usize,
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
    pub generation: u64,
}

impl Snapshot {
    /// Runs header detection and index building over a loaded sheet.
    pub fn build(
        loaded: LoadedSheet,
        rules: &HeaderRules,
        options: &QueryOptions,
        generation: u64,
    ) -> Result<Self> {
        let layout = header::resolve(&loaded.grid, rules)?;
        let (index, categories) = index::build(&loaded.grid, &layout, options.identifier_mode);
        let data_rows = loaded.grid.len().saturating_sub(layout.header_row + 1);
        Ok(Self {
            index,
            categories,
            layout,
            sheet_name: loaded.sheet_name,
            data_rows,
            content_hash: loaded.content_hash,
            loaded_at: Utc::now(),
            generation,
        })
    }
}

#[derive(Debug, Clone)]
pub enum CatalogState {
    Loaded(Arc<Snapshot>),
    Unloaded {
        reason: String,
        code: Option<&'static str>,
    },
}

/// Returned by queries while no index is available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("catalog not loaded: {reason}")]
pub struct NotLoaded {
    pub reason: String,
}

/// A query answer, with the document URL when something was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub result: QueryResult,
    pub url: Option<ResolvedUrl>,
}

/// Serializable summary for status endpoints and CLI output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CatalogStatus {
    Loaded {
        location: String,
        sheet: String,
        header_row: usize,
        identifier_column: usize,
        rows: usize,
        identifiers: usize,
        entries: usize,
        categories: usize,
        generation: u64,
        loaded_at: DateTime<Utc>,
        content_hash: String,
    },
    Unloaded {
        location: String,
        reason: String,
        code: Option<&'static str>,
    },
}

struct Applied {
    generation: u64,
    state: CatalogState,
}

pub struct Catalog {
    source: Arc<dyn SpreadsheetSource>,
    rules: HeaderRules,
    options: QueryOptions,
    pdf_base: String,
    next_generation: AtomicU64,
    current: RwLock<Applied>,
}

impl Catalog {
    pub fn new(
        source: Arc<dyn SpreadsheetSource>,
        rules: HeaderRules,
        options: QueryOptions,
        pdf_base: impl Into<String>,
    ) -> Self {
        Self {
            source,
            rules,
            options,
            pdf_base: pdf_base.into(),
            next_generation: AtomicU64::new(1),
            current: RwLock::new(Applied {
                generation: 0,
                state: CatalogState::Unloaded {
                    reason: "not loaded yet".to_string(),
                    code: None,
                },
            }),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let location = config
            .source
            .excel_location()
            .context("no spreadsheet location configured")?;
        let pdf_base = config
            .source
            .pdf_base()
            .context("no document base configured")?;
        let source = loader::source_for(&location, config.source.timeout_secs)?;
        Ok(Self::new(
            Arc::from(source),
            config.detection.rules(),
            config.query.options(),
            pdf_base,
        ))
    }

    fn read(&self) -> RwLockReadGuard<'_, Applied> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Applied> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn location(&self) -> String {
        self.source.location()
    }

    pub fn pdf_base(&self) -> &str {
        &self.pdf_base
    }

    pub fn state(&self) -> CatalogState {
        self.read().state.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match &self.read().state {
            CatalogState::Loaded(s) => Some(Arc::clone(s)),
            CatalogState::Unloaded { .. } => None,
        }
    }

    /// Loads the spreadsheet again and swaps in the result.
    ///
    /// Returns this load's own outcome. Whether it was applied depends on
    /// whether a newer reload finished first.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        self.reload_tracked().await.0
    }

    /// Reloads and reports the state callers should see afterwards.
    ///
    /// Fails only when this reload's own outcome was applied and was a
    /// failure. A failure superseded by a newer reload reports the status
    /// that newer reload left behind.
    pub async fn reload_status(&self) -> Result<CatalogStatus> {
        let (outcome, applied) = self.reload_tracked().await;
        match outcome {
            Err(e) if applied => Err(e),
            _ => Ok(self.status()),
        }
    }

    /// This load's outcome and whether it replaced the current state.
    async fn reload_tracked(&self) -> (Result<Arc<Snapshot>>, bool) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(generation, location = %self.source.location(), "reload started");

        let outcome = loader::load(self.source.as_ref())
            .await
            .and_then(|loaded| Snapshot::build(loaded, &self.rules, &self.options, generation))
            .map(Arc::new);

        let mut current = self.write();
        if generation < current.generation {
            tracing::info!(
                generation,
                applied = current.generation,
                "discarding result of superseded reload"
            );
            return (outcome, false);
        }
        current.generation = generation;
        current.state = match &outcome {
            Ok(snapshot) => {
                tracing::info!(
                    generation,
                    identifiers = snapshot.index.len(),
                    categories = snapshot.categories.len(),
                    "catalog loaded"
                );
                CatalogState::Loaded(Arc::clone(snapshot))
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "catalog load failed");
                CatalogState::Unloaded {
                    reason: e.to_string(),
                    code: Some(e.code()),
                }
            }
        };
        (outcome, true)
    }

    /// Category names of the current snapshot.
    pub fn categories(&self) -> std::result::Result<CategoryList, NotLoaded> {
        Ok(self.loaded()?.categories.clone())
    }

    /// Answers a query against the current snapshot.
    pub fn lookup(
        &self,
        identifier: &str,
        category: &str,
    ) -> std::result::Result<Lookup, NotLoaded> {
        let snapshot = self.loaded()?;
        let result = query::resolve(
            &snapshot.index,
            &snapshot.categories,
            identifier,
            category,
            &self.options,
        );
        let url = match &result {
            QueryResult::Found { document_reference } => {
                Some(document_url::resolve(document_reference, &self.pdf_base))
            }
            _ => None,
        };
        Ok(Lookup { result, url })
    }

    fn loaded(&self) -> std::result::Result<Arc<Snapshot>, NotLoaded> {
        match &self.read().state {
            CatalogState::Loaded(s) => Ok(Arc::clone(s)),
            CatalogState::Unloaded { reason, .. } => Err(NotLoaded {
                reason: reason.clone(),
            }),
        }
    }

    pub fn status(&self) -> CatalogStatus {
        let location = self.source.location();
        match self.state() {
            CatalogState::Loaded(s) => CatalogStatus::Loaded {
                location,
                sheet: s.sheet_name.clone(),
                header_row: s.layout.header_row,
                identifier_column: s.layout.identifier_column,
                rows: s.data_rows,
                identifiers: s.index.len(),
                entries: s.index.entry_count(),
                categories: s.categories.len(),
                generation: s.generation,
                loaded_at: s.loaded_at,
                content_hash: s.content_hash.clone(),
            },
            CatalogState::Unloaded { reason, code } => CatalogStatus::Unloaded {
                location,
                reason,
                code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::xlsx::tests::workbook_bytes;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves scripted responses in call order, each after its own delay.
    struct ScriptedSource {
        script: Mutex<VecDeque<(Duration, Result<Vec<u8>>)>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<(u64, Result<Vec<u8>>)>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|(ms, r)| (Duration::from_millis(ms), r))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl SpreadsheetSource for ScriptedSource {
        fn location(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch(&self) -> Result<Vec<u8>> {
            let next = self.script.lock().unwrap().pop_front();
            let (delay, result) =
                next.unwrap_or((Duration::ZERO, Err(LookupError::Retrieval("exhausted".into()))));
            tokio::time::sleep(delay).await;
            result
        }
    }

    fn workbook(rows: &str) -> Vec<u8> {
        workbook_bytes(
            &[(
                "Hoja1",
                &format!("<worksheet><sheetData>{}</sheetData></worksheet>", rows),
            )],
            &["SAP", "GALLETAS", "file1", "file2"],
        )
    }

    fn good(doc_index: usize) -> Vec<u8> {
        workbook(&format!(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2"><v>123</v></c><c r="B2" t="s"><v>{}</v></c></row>"#,
            doc_index
        ))
    }

    fn catalog(source: ScriptedSource) -> Arc<Catalog> {
        Arc::new(Catalog::new(
            Arc::new(source),
            HeaderRules::default(),
            QueryOptions::default(),
            "https://example.org/pdfs/",
        ))
    }

    fn found_url(catalog: &Catalog) -> String {
        let lookup = catalog.lookup("123", "GALLETAS").unwrap();
        lookup.url.unwrap().url
    }

    #[tokio::test]
    async fn unloaded_catalog_reports_reason() {
        let cat = catalog(ScriptedSource::new(vec![]));
        let err = cat.lookup("123", "GALLETAS").unwrap_err();
        assert_eq!(err.reason, "not loaded yet");
        assert!(matches!(cat.status(), CatalogStatus::Unloaded { .. }));
    }

    #[tokio::test]
    async fn successful_load_answers_queries() {
        let cat = catalog(ScriptedSource::new(vec![(0, Ok(good(2)))]));
        cat.reload().await.unwrap();
        assert_eq!(found_url(&cat), "https://example.org/pdfs/file1.pdf");

        let miss = cat.lookup("999", "GALLETAS").unwrap();
        assert_eq!(miss.result, QueryResult::NotFoundIdentifier);
        assert!(miss.url.is_none());
        assert_eq!(cat.categories().unwrap().as_slice(), ["GALLETAS"]);
    }

    #[tokio::test]
    async fn failed_reload_replaces_index_with_unloaded_state() {
        let cat = catalog(ScriptedSource::new(vec![
            (0, Ok(good(2))),
            (0, Err(LookupError::Retrieval("HTTP 404".into()))),
        ]));
        cat.reload().await.unwrap();
        let err = cat.reload().await.unwrap_err();
        assert!(err.is_retrieval());
        match cat.status() {
            CatalogStatus::Unloaded { code, reason, .. } => {
                assert_eq!(code, Some("retrieval_error"));
                assert!(reason.contains("could not retrieve"));
            }
            other => panic!("expected unloaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn schema_errors_are_surfaced() {
        let cat = catalog(ScriptedSource::new(vec![(
            0,
            Ok(workbook(r#"<row r="1"><c r="A1" t="s"><v>2</v></c></row>"#)),
        )]));
        let err = cat.reload().await.unwrap_err();
        assert_eq!(err, LookupError::HeaderNotFound { scanned: 1 });
    }

    #[tokio::test]
    async fn stale_success_does_not_overwrite_newer_index() {
        let cat = catalog(ScriptedSource::new(vec![
            (200, Ok(good(2))),
            (0, Ok(good(3))),
        ]));
        let slow = {
            let cat = Arc::clone(&cat);
            tokio::spawn(async move { cat.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cat.reload().await.unwrap();
        assert_eq!(found_url(&cat), "https://example.org/pdfs/file2.pdf");

        // The older load still completes successfully, but is discarded.
        slow.await.unwrap().unwrap();
        assert_eq!(found_url(&cat), "https://example.org/pdfs/file2.pdf");
        match cat.status() {
            CatalogStatus::Loaded { generation, .. } => assert_eq!(generation, 2),
            other => panic!("expected loaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stale_failure_keeps_newer_index() {
        let empty = workbook("");
        let cat = catalog(ScriptedSource::new(vec![(200, Ok(empty)), (0, Ok(good(2)))]));
        let slow = {
            let cat = Arc::clone(&cat);
            tokio::spawn(async move { cat.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cat.reload().await.unwrap();

        let err = slow.await.unwrap().unwrap_err();
        assert_eq!(err, LookupError::EmptyDocument);
        assert_eq!(found_url(&cat), "https://example.org/pdfs/file1.pdf");
    }

    #[tokio::test]
    async fn superseded_failure_reports_newer_status() {
        let cat = catalog(ScriptedSource::new(vec![
            (200, Err(LookupError::Retrieval("HTTP 503".into()))),
            (0, Ok(good(2))),
        ]));
        let slow = {
            let cat = Arc::clone(&cat);
            tokio::spawn(async move { cat.reload_status().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cat.reload().await.unwrap();

        match slow.await.unwrap().unwrap() {
            CatalogStatus::Loaded { generation, .. } => assert_eq!(generation, 2),
            other => panic!("expected loaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn applied_failure_is_reported_by_reload_status() {
        let cat = catalog(ScriptedSource::new(vec![(
            0,
            Err(LookupError::Retrieval("HTTP 404".into())),
        )]));
        let err = cat.reload_status().await.unwrap_err();
        assert!(err.is_retrieval());
    }
}
