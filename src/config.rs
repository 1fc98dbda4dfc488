//! TOML configuration.
//!
//! ```toml
//! [source]
//! excel_url = "https://raw.githubusercontent.com/acme/data/main/data/Layout.xlsx"
//! pdf_base = "https://raw.githubusercontent.com/acme/data/main/pdfs/"
//!
//! [detection]
//! category_policy = "residual"
//!
//! [query]
//! identifier_mode = "alphanumeric"
//! ```
//!
//! Instead of explicit URLs, `[source.github]` derives both locations from a
//! repository's raw-content host.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::header::{
    ColumnDetectionPolicy, HeaderRules, PolicyKind, DEFAULT_CATEGORY_ALIASES,
    DEFAULT_EXCLUDED_HEADERS, DEFAULT_IDENTIFIER_ALIASES, DEFAULT_SCAN_LIMIT,
};
use crate::normalize::{normalize_header, IdentifierMode};
use crate::query::{EmptyCategoryPolicy, QueryOptions};

const GITHUB_RAW_HOST: &str = "https://raw.githubusercontent.com";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub excel_url: Option<String>,
    #[serde(default)]
    pub pdf_base: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub github: Option<GithubSourceConfig>,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubSourceConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_excel_path")]
    pub excel_path: String,
    #[serde(default = "default_pdf_path")]
    pub pdf_path: String,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_excel_path() -> String {
    "data/Layout.xlsx".to_string()
}
fn default_pdf_path() -> String {
    "pdfs/".to_string()
}

impl GithubSourceConfig {
    fn raw_base(&self) -> String {
        format!(
            "{}/{}/{}/{}/",
            GITHUB_RAW_HOST,
            self.owner.trim(),
            self.repo.trim(),
            self.branch.trim()
        )
    }

    pub fn excel_url(&self) -> String {
        format!("{}{}", self.raw_base(), self.excel_path.trim_start_matches('/'))
    }

    pub fn pdf_base(&self) -> String {
        let base = format!("{}{}", self.raw_base(), self.pdf_path.trim_start_matches('/'));
        if base.ends_with('/') {
            base
        } else {
            base + "/"
        }
    }
}

impl SourceConfig {
    /// Spreadsheet location: explicit URL/path or the derived GitHub raw URL.
    pub fn excel_location(&self) -> Option<String> {
        self.excel_url
            .clone()
            .or_else(|| self.github.as_ref().map(GithubSourceConfig::excel_url))
    }

    /// Document base location.
    pub fn pdf_base(&self) -> Option<String> {
        self.pdf_base
            .clone()
            .or_else(|| self.github.as_ref().map(GithubSourceConfig::pdf_base))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_identifier_aliases")]
    pub identifier_aliases: Vec<String>,
    #[serde(default = "default_scan_limit")]
    pub header_scan_limit: usize,
    #[serde(default)]
    pub category_policy: PolicyKind,
    #[serde(default = "default_category_aliases")]
    pub category_aliases: Vec<String>,
    #[serde(default)]
    pub category_keywords: Vec<String>,
    /// Appended to the built-in exclusion set for the residual policy.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub manual_columns: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_identifier_aliases() -> Vec<String> {
    to_strings(DEFAULT_IDENTIFIER_ALIASES)
}
fn default_category_aliases() -> Vec<String> {
    to_strings(DEFAULT_CATEGORY_ALIASES)
}
fn default_scan_limit() -> usize {
    DEFAULT_SCAN_LIMIT
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            identifier_aliases: default_identifier_aliases(),
            header_scan_limit: DEFAULT_SCAN_LIMIT,
            category_policy: PolicyKind::default(),
            category_aliases: default_category_aliases(),
            category_keywords: Vec::new(),
            exclude: Vec::new(),
            manual_columns: Vec::new(),
        }
    }
}

impl DetectionConfig {
    pub fn policy(&self) -> ColumnDetectionPolicy {
        match self.category_policy {
            PolicyKind::Residual => {
                let mut exclude = to_strings(DEFAULT_EXCLUDED_HEADERS);
                exclude.extend(self.exclude.iter().cloned());
                ColumnDetectionPolicy::residual(&exclude)
            }
            PolicyKind::Alias => {
                ColumnDetectionPolicy::alias(&self.category_aliases, &self.category_keywords)
            }
            PolicyKind::Manual => ColumnDetectionPolicy::manual(&self.manual_columns),
        }
    }

    pub fn rules(&self) -> HeaderRules {
        HeaderRules::new(
            &self.identifier_aliases,
            self.header_scan_limit,
            self.policy(),
        )
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueryConfig {
    #[serde(default)]
    pub identifier_mode: IdentifierMode,
    #[serde(default)]
    pub empty_category: EmptyCategoryPolicy,
}

impl QueryConfig {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            identifier_mode: self.identifier_mode,
            empty_category: self.empty_category,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parses and validates configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate source
    let source = &config.source;
    match (&source.github, &source.excel_url, &source.pdf_base) {
        (Some(gh), None, None) => {
            if gh.owner.trim().is_empty() || gh.repo.trim().is_empty() {
                anyhow::bail!("source.github.owner and source.github.repo must not be empty");
            }
        }
        (Some(_), _, _) => {
            anyhow::bail!("source.github cannot be combined with source.excel_url or source.pdf_base")
        }
        (None, Some(excel), Some(pdf)) => {
            if excel.trim().is_empty() || pdf.trim().is_empty() {
                anyhow::bail!("source.excel_url and source.pdf_base must not be empty");
            }
        }
        (None, _, _) => {
            anyhow::bail!("set both source.excel_url and source.pdf_base, or [source.github]")
        }
    }
    if source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be >= 1");
    }

    // Validate detection
    let detection = &config.detection;
    if detection.header_scan_limit == 0 {
        anyhow::bail!("detection.header_scan_limit must be >= 1");
    }
    if detection
        .identifier_aliases
        .iter()
        .all(|a| normalize_header(a).is_empty())
    {
        anyhow::bail!("detection.identifier_aliases must contain at least one usable alias");
    }
    match detection.category_policy {
        PolicyKind::Manual if detection.manual_columns.is_empty() => {
            anyhow::bail!("detection.manual_columns must be set when category_policy is 'manual'")
        }
        PolicyKind::Alias
            if detection.category_aliases.is_empty() && detection.category_keywords.is_empty() =>
        {
            anyhow::bail!(
                "detection.category_aliases or detection.category_keywords must be set when category_policy is 'alias'"
            )
        }
        _ => {}
    }

    Ok(config)
}
