//! HTTP query surface.
//!
//! Serves the catalog as a small JSON API for the lookup page (category
//! dropdown, SAP input, open/download buttons).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Loaded sheet and index summary, or the unloaded reason |
//! | `GET`  | `/categories` | Category list for the dropdown |
//! | `GET`  | `/lookup?sap=..&category=..&probe=..` | Resolve a SAP code to a document URL |
//! | `POST` | `/reload` | Fetch the spreadsheet again and swap the index |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_loaded", "message": "catalog not loaded: ..." } }
//! ```
//!
//! Not-found lookups are not errors: they return `200` with an `outcome`
//! other than `found` and no `url`, so clients hide their open/download
//! actions.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::{Catalog, CatalogStatus, NotLoaded};
use crate::config::Config;
use crate::document_url::{probe_document, ProbeOutcome};
use crate::error::LookupError;
use crate::models::QueryResult;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Catalog>,
    /// Timeout for optional document existence probes.
    probe_timeout_secs: u64,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, probe_timeout_secs: u64) -> Self {
        Self {
            catalog,
            probe_timeout_secs,
        }
    }
}

/// Builds the router; split out so tests can serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/categories", get(handle_categories))
        .route("/lookup", get(handle_lookup))
        .route("/reload", post(handle_reload))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Performs an initial load before binding. A failed initial load is logged
/// and the server still starts in the unloaded state, so `/reload` can
/// recover once the spreadsheet is fixed.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog = Arc::new(Catalog::from_config(config)?);
    if let Err(e) = catalog.reload().await {
        tracing::warn!(error = %e, "initial load failed; serving unloaded catalog");
    }

    let app = router(AppState::new(catalog, config.source.timeout_secs));
    let bind_addr = config.server.bind.clone();

    tracing::info!(%bind_addr, "server listening");
    println!("sap-lookup listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<NotLoaded> for AppError {
    fn from(e: NotLoaded) -> Self {
        AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "not_loaded".to_string(),
            message: e.to_string(),
        }
    }
}

/// Retrieval problems are upstream failures (502); everything else means
/// the spreadsheet content is unusable (422).
impl From<LookupError> for AppError {
    fn from(e: LookupError) -> Self {
        let status = if e.is_retrieval() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        };
        AppError {
            status,
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<CatalogStatus> {
    Json(state.catalog.status())
}

// ============ GET /categories ============

#[derive(Serialize)]
struct CategoriesResponse {
    categories: Vec<String>,
}

async fn handle_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let categories = state.catalog.categories()?;
    Ok(Json(CategoriesResponse {
        categories: categories.as_slice().to_vec(),
    }))
}

// ============ GET /lookup ============

#[derive(Deserialize)]
struct LookupParams {
    #[serde(default)]
    sap: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    probe: bool,
}

#[derive(Serialize)]
struct LookupResponse {
    /// `found`, `not_found_identifier`, `not_found_category` or `empty_input`.
    outcome: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe: Option<ProbeOutcome>,
}

async fn handle_lookup(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, AppError> {
    let lookup = state.catalog.lookup(&params.sap, &params.category)?;

    let probe = match (&lookup.url, params.probe) {
        (Some(resolved), true) => {
            Some(probe_document(&resolved.url, state.probe_timeout_secs).await)
        }
        _ => None,
    };

    let document = match &lookup.result {
        QueryResult::Found { document_reference } => {
            Some(document_reference.clone())
        }
        _ => None,
    };

    Ok(Json(LookupResponse {
        outcome: lookup.result.code(),
        message: lookup.result.message(),
        document,
        filename: lookup.url.as_ref().map(|u| u.filename.clone()),
        url: lookup.url.map(|u| u.url),
        probe,
    }))
}

// ============ POST /reload ============

async fn handle_reload(State(state): State<AppState>) -> Result<Json<CatalogStatus>, AppError> {
    Ok(Json(state.catalog.reload_status().await?))
}
