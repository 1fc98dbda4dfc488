//! CLI command implementations: `check`, `load`, `categories`, `query`.
//!
//! Load failures propagate as errors (non-zero exit). Query outcomes other
//! than `found` are informational and exit successfully.

use anyhow::Result;

use crate::catalog::{Catalog, CatalogStatus};
use crate::config::Config;
use crate::document_url::{probe_document, ProbeOutcome};
use crate::header::ColumnDetectionPolicy;

pub fn run_check(config: &Config) -> Result<()> {
    let excel = config.source.excel_location().unwrap_or_default();
    let pdf_base = config.source.pdf_base().unwrap_or_default();
    let rules = config.detection.rules();

    println!("{:<20} {}", "spreadsheet", excel);
    println!("{:<20} {}", "document base", pdf_base);
    println!(
        "{:<20} {}",
        "identifier aliases",
        rules.identifier_aliases().join(", ")
    );
    println!("{:<20} {}", "header scan limit", rules.scan_limit());
    let policy = match rules.policy() {
        ColumnDetectionPolicy::Residual { exclude } => {
            format!("residual (excluding {})", exclude.join(", "))
        }
        ColumnDetectionPolicy::Alias { aliases, keywords } => {
            format!(
                "alias (aliases {}; keywords {})",
                aliases.join(", "),
                keywords.join(", ")
            )
        }
        ColumnDetectionPolicy::Manual { columns } => format!("manual ({})", columns.join(", ")),
    };
    println!("{:<20} {}", "category policy", policy);
    println!("{:<20} {:?}", "identifier mode", config.query.identifier_mode);
    println!("{:<20} {:?}", "empty category", config.query.empty_category);
    Ok(())
}

async fn load_catalog(config: &Config) -> Result<Catalog> {
    let catalog = Catalog::from_config(config)?;
    catalog.reload().await?;
    Ok(catalog)
}

pub async fn run_load(config: &Config) -> Result<()> {
    let catalog = load_catalog(config).await?;
    if let CatalogStatus::Loaded {
        location,
        sheet,
        header_row,
        identifier_column,
        rows,
        identifiers,
        entries,
        categories,
        content_hash,
        ..
    } = catalog.status()
    {
        println!("loaded {}", location);
        println!("  sheet: {}", sheet);
        println!("  header row: {}", header_row + 1);
        println!("  identifier column: {}", identifier_column + 1);
        println!("  data rows: {}", rows);
        println!("  categories: {}", categories);
        println!("  identifiers: {}", identifiers);
        println!("  entries: {}", entries);
        println!("  sha256: {}", content_hash);
    }
    Ok(())
}

pub async fn run_categories(config: &Config) -> Result<()> {
    let catalog = load_catalog(config).await?;
    for name in catalog.categories()?.iter() {
        println!("{}", name);
    }
    Ok(())
}

pub async fn run_query(
    config: &Config,
    identifier: &str,
    category: Option<&str>,
    probe: bool,
) -> Result<()> {
    let catalog = load_catalog(config).await?;
    let lookup = catalog.lookup(identifier, category.unwrap_or(""))?;

    let Some(resolved) = lookup.url else {
        println!("{}", lookup.result.message());
        return Ok(());
    };

    println!("{}", resolved.url);
    if probe {
        match probe_document(&resolved.url, config.source.timeout_secs).await {
            ProbeOutcome::Available => println!("  available"),
            ProbeOutcome::Missing(status) => println!("  missing (HTTP {})", status),
            ProbeOutcome::Unreachable(e) => println!("  unreachable: {}", e),
        }
    }
    Ok(())
}
