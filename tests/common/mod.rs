//! Shared fixtures: in-memory XLSX workbooks and a local HTTP file server.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds a workbook whose sheets hold inline-string cells.
pub fn workbook(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let opts = zip::write::SimpleFileOptions::default();

        let mut wb = String::from("<?xml version=\"1.0\"?><workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets>");
        let mut rels = String::from("<?xml version=\"1.0\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">");
        for (i, (name, _)) in sheets.iter().enumerate() {
            wb.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
                name,
                i + 1,
                i + 1
            ));
            rels.push_str(&format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
                i + 1,
                i + 1
            ));
        }
        wb.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");

        zip.start_file("xl/workbook.xml", opts).unwrap();
        zip.write_all(wb.as_bytes()).unwrap();
        zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();

        for (i, (_, rows)) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), opts)
                .unwrap();
            zip.write_all(sheet_xml(rows).as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn sheet_xml(rows: &[Vec<&str>]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>");
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = (b'A' + c as u8) as char;
            xml.push_str(&format!(
                "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                col,
                r + 1,
                escape(value)
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The layout sheet used across tests: a title row and a blank row above
/// the header, a metadata column, and two category columns.
pub fn layout_workbook() -> Vec<u8> {
    workbook(&[
        ("Notas", vec![]),
        (
            "Layouts",
            vec![
                vec!["Planogramas 2024"],
                vec![],
                vec!["Código SAP", "Descripción", "Layout", "Fotos"],
                vec!["12345", "Shampoo", "L-12345", "F-12345"],
                vec!["AB-77", "Jabón", "Report & Notes", ""],
                vec!["", "sin código", "X", "Y"],
            ],
        ),
    ])
}

/// Same header as [`layout_workbook`] with a different document for `12345`.
pub fn updated_layout_workbook() -> Vec<u8> {
    workbook(&[(
        "Layouts",
        vec![
            vec!["Código SAP", "Descripción", "Layout", "Fotos"],
            vec!["12345", "Shampoo", "L-12345-v2", "F-12345"],
        ],
    )])
}

/// A served file: body plus an artificial delay before responding.
#[derive(Clone)]
pub struct Served {
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl Served {
    pub fn now(body: Vec<u8>) -> Self {
        Self {
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn after(body: Vec<u8>, delay: Duration) -> Self {
        Self { body, delay }
    }
}

/// Local file server. Unknown paths answer 404; files can be replaced while
/// the server runs.
#[derive(Clone, Default)]
pub struct FileServer {
    files: Arc<Mutex<HashMap<String, Served>>>,
}

impl FileServer {
    pub fn put(&self, name: &str, served: Served) {
        self.files.lock().unwrap().insert(name.to_string(), served);
    }

    /// Serves on an ephemeral port and returns the base URL.
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/files/{name}", get(serve_file).head(serve_file))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/files", addr)
    }
}

async fn serve_file(
    State(server): State<FileServer>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let served = server.files.lock().unwrap().get(&name).cloned();
    match served {
        Some(served) => {
            tokio::time::sleep(served.delay).await;
            (StatusCode::OK, served.body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
