mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FileServer, Served};
use sap_lookup::catalog::{Catalog, CatalogStatus};
use sap_lookup::error::LookupError;
use sap_lookup::header::HeaderRules;
use sap_lookup::loader::{self, HttpSource};
use sap_lookup::models::QueryResult;
use sap_lookup::query::QueryOptions;
use sap_lookup::server::{router, AppState};
use serde_json::Value;

fn catalog_for(url: &str, pdf_base: &str) -> Arc<Catalog> {
    let source = HttpSource::new(url, 5).unwrap();
    Arc::new(Catalog::new(
        Arc::new(source),
        HeaderRules::default(),
        QueryOptions::default(),
        pdf_base,
    ))
}

async fn serve_app(catalog: Arc<Catalog>) -> String {
    let app = router(AppState::new(catalog, 5));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_source_loads_workbook() {
    let files = FileServer::default();
    files.put("Layout.xlsx", Served::now(common::layout_workbook()));
    let base = files.start().await;

    let source = HttpSource::new(format!("{}/Layout.xlsx", base), 5).unwrap();
    let loaded = loader::load(&source).await.unwrap();
    assert_eq!(loaded.sheet_name, "Layouts");
    assert_eq!(loaded.grid.cell(2, 0), "Código SAP");
    assert_eq!(loaded.content_hash.len(), 64);
}

#[tokio::test]
async fn test_http_source_non_success_is_retrieval_error() {
    let files = FileServer::default();
    let base = files.start().await;

    let source = HttpSource::new(format!("{}/missing.xlsx", base), 5).unwrap();
    let err = loader::load(&source).await.unwrap_err();
    assert!(matches!(err, LookupError::Retrieval(_)), "got {:?}", err);
    assert!(err.to_string().contains("404"), "message: {}", err);
}

#[tokio::test]
async fn test_http_source_rejects_oversized_body() {
    let files = FileServer::default();
    files.put("Layout.xlsx", Served::now(common::layout_workbook()));
    let base = files.start().await;
    let url = format!("{}/Layout.xlsx", base);

    let source = HttpSource::new(url.clone(), 5).unwrap().with_max_bytes(64);
    let err = loader::load(&source).await.unwrap_err();
    assert!(matches!(err, LookupError::Retrieval(_)), "got {:?}", err);
    assert!(err.to_string().contains("size limit"), "message: {}", err);

    let size = common::layout_workbook().len() as u64;
    let source = HttpSource::new(url, 5).unwrap().with_max_bytes(size);
    assert!(loader::load(&source).await.is_ok());
}

#[tokio::test]
async fn test_failed_reload_leaves_catalog_unloaded() {
    let files = FileServer::default();
    let base = files.start().await;
    let catalog = catalog_for(&format!("{}/missing.xlsx", base), "https://docs.example.org");

    assert!(catalog.reload().await.is_err());
    match catalog.status() {
        CatalogStatus::Unloaded { code, .. } => assert_eq!(code, Some("retrieval_error")),
        other => panic!("expected unloaded, got {:?}", other),
    }
    assert!(catalog.lookup("12345", "Layout").is_err());
}

#[tokio::test]
async fn test_slow_superseded_reload_is_discarded() {
    let files = FileServer::default();
    files.put(
        "Layout.xlsx",
        Served::after(common::layout_workbook(), Duration::from_millis(600)),
    );
    let base = files.start().await;
    let catalog = catalog_for(&format!("{}/Layout.xlsx", base), "https://docs.example.org");

    let slow = {
        let catalog = Arc::clone(&catalog);
        tokio::spawn(async move { catalog.reload().await })
    };
    // Let the slow request reach the server before the file changes.
    tokio::time::sleep(Duration::from_millis(150)).await;
    files.put("Layout.xlsx", Served::now(common::updated_layout_workbook()));

    let fresh = catalog.reload().await.unwrap();
    let stale = slow.await.unwrap().unwrap();
    assert!(stale.generation < fresh.generation);

    let current = catalog.snapshot().unwrap();
    assert_eq!(current.generation, fresh.generation);
    let lookup = catalog.lookup("12345", "Layout").unwrap();
    assert_eq!(
        lookup.result,
        QueryResult::Found {
            document_reference: "L-12345-v2".to_string()
        }
    );
}

#[tokio::test]
async fn test_server_lookup_endpoints() {
    let files = FileServer::default();
    files.put("Layout.xlsx", Served::now(common::layout_workbook()));
    files.put("L-12345.pdf", Served::now(b"%PDF-1.4".to_vec()));
    let base = files.start().await;
    let catalog = catalog_for(&format!("{}/Layout.xlsx", base), &base);
    catalog.reload().await.unwrap();
    let app = serve_app(catalog).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", app))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let categories: Value = client
        .get(format!("{}/categories", app))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories["categories"], serde_json::json!(["Fotos", "Layout"]));

    let found: Value = client
        .get(format!("{}/lookup", app))
        .query(&[("sap", " 12345 "), ("category", "LAYOUT"), ("probe", "true")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["outcome"], "found");
    assert_eq!(found["document"], "L-12345");
    assert_eq!(found["url"], format!("{}/L-12345.pdf", base));
    assert_eq!(found["probe"]["state"], "available");

    let missing_pdf: Value = client
        .get(format!("{}/lookup", app))
        .query(&[("sap", "12345"), ("category", "Fotos"), ("probe", "true")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(missing_pdf["outcome"], "found");
    assert_eq!(missing_pdf["probe"]["state"], "missing");
    assert_eq!(missing_pdf["probe"]["detail"], 404);

    let response = client
        .get(format!("{}/lookup", app))
        .query(&[("sap", "00000"), ("category", "Layout")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let not_found: Value = response.json().await.unwrap();
    assert_eq!(not_found["outcome"], "not_found_identifier");
    assert!(not_found.get("url").is_none());

    let empty: Value = client
        .get(format!("{}/lookup", app))
        .query(&[("sap", "  "), ("category", "Layout")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["outcome"], "empty_input");
}

#[tokio::test]
async fn test_server_reload_and_unloaded_errors() {
    let files = FileServer::default();
    let base = files.start().await;
    let catalog = catalog_for(&format!("{}/Layout.xlsx", base), &base);
    let app = serve_app(catalog).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/categories", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_loaded");

    let response = client
        .post(format!("{}/reload", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "retrieval_error");

    files.put("Layout.xlsx", Served::now(b"garbage".to_vec()));
    let response = client
        .post(format!("{}/reload", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    files.put("Layout.xlsx", Served::now(common::layout_workbook()));
    let response = client
        .post(format!("{}/reload", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let status: Value = response.json().await.unwrap();
    assert_eq!(status["state"], "loaded");
    assert_eq!(status["sheet"], "Layouts");
    assert_eq!(status["identifiers"], 2);
    assert_eq!(status["rows"], 3);

    let status: Value = client
        .get(format!("{}/status", app))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["categories"], 2);
}
