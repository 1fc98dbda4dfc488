//! # SAP Lookup CLI (`sap-lookup`)
//!
//! Loads the SAP layout spreadsheet, builds the lookup index, and resolves
//! SAP codes to PDF document URLs, either from the command line or through
//! the HTTP query surface.
//!
//! ## Usage
//!
//! ```bash
//! sap-lookup --config ./config/sap-lookup.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sap-lookup check` | Validate the configuration and print the effective settings |
//! | `sap-lookup load` | Fetch the spreadsheet and print the detected layout |
//! | `sap-lookup categories` | List the category columns in display order |
//! | `sap-lookup query <sap>` | Resolve a SAP code to a document URL |
//! | `sap-lookup serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! sap-lookup query 12345 --category Layout --probe
//! RUST_LOG=sap_lookup=trace sap-lookup load
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sap_lookup::{config, logging, lookup_cmd, server};

/// SAP Lookup CLI: resolve SAP codes to layout documents from a shared
/// spreadsheet.
#[derive(Parser)]
#[command(
    name = "sap-lookup",
    about = "Resolve SAP codes to layout documents from a shared spreadsheet",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sap-lookup.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective settings.
    Check,

    /// Fetch and decode the spreadsheet, then print the detected header,
    /// identifier column, and index size.
    Load,

    /// List the category columns in display order.
    Categories,

    /// Resolve a SAP code to a document URL.
    ///
    /// Prints the URL when found, otherwise the reason nothing matched.
    Query {
        /// SAP code as typed; spaces and punctuation are ignored.
        sap: String,

        /// Category column name (case and accent insensitive).
        #[arg(long, short)]
        category: Option<String>,

        /// Check the document exists with a HEAD request.
        #[arg(long)]
        probe: bool,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Check => {
            lookup_cmd::run_check(&cfg)?;
        }
        Commands::Load => {
            lookup_cmd::run_load(&cfg).await?;
        }
        Commands::Categories => {
            lookup_cmd::run_categories(&cfg).await?;
        }
        Commands::Query {
            sap,
            category,
            probe,
        } => {
            lookup_cmd::run_query(&cfg, &sap, category.as_deref(), probe).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
