//! Document URL resolution.
//!
//! A stored reference such as `docs\Report & Notes` becomes
//! `<base>/Report%20%26%20Notes.pdf`: directory prefixes are dropped, a
//! `.pdf` suffix is enforced (case-insensitively), and the filename is
//! percent-encoded as a single path segment.
//!
//! Whether the document actually exists is not checked here;
//! [`probe_document`] is a separate, optional network check.

use std::time::Duration;

use serde::Serialize;

use crate::models::ResolvedUrl;

/// Joins a document reference onto `base`.
pub fn resolve(document_reference: &str, base: &str) -> ResolvedUrl {
    let filename = pdf_filename(document_reference);
    let url = format!("{}/{}", base.trim().trim_end_matches('/'), uri_encode(&filename));
    ResolvedUrl { filename, url }
}

/// Last non-empty path segment of the reference with a `.pdf` suffix
/// enforced, so `fichas/` still names `fichas.pdf`.
pub fn pdf_filename(document_reference: &str) -> String {
    let name = document_reference
        .rsplit(['/', '\\'])
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .unwrap_or("");
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{}.pdf", name)
    }
}

/// URI-encode a string per RFC 3986, leaving only unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Result of an optional existence check on a resolved URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Available,
    Missing(u16),
    Unreachable(String),
}

/// Issues a `HEAD` request for `url`. Never fails; transport problems are
/// reported as [`ProbeOutcome::Unreachable`].
pub async fn probe_document(url: &str, timeout_secs: u64) -> ProbeOutcome {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
    };
    match client.head(url).send().await {
        Ok(resp) if resp.status().is_success() => ProbeOutcome::Available,
        Ok(resp) => {
            tracing::debug!(%url, status = %resp.status(), "document probe failed");
            ProbeOutcome::Missing(resp.status().as_u16())
        }
        Err(e) => ProbeOutcome::Unreachable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters_are_encoded() {
        let resolved = resolve("Report & Notes", "https://example.org/docs");
        assert_eq!(resolved.url, "https://example.org/docs/Report%20%26%20Notes.pdf");
        assert_eq!(resolved.filename, "Report & Notes.pdf");
    }

    #[test]
    fn base_gets_exactly_one_separator() {
        for base in ["https://h/pdfs", "https://h/pdfs/", "https://h/pdfs///"] {
            assert_eq!(resolve("a", base).url, "https://h/pdfs/a.pdf");
        }
    }

    #[test]
    fn extension_is_enforced_once() {
        assert_eq!(pdf_filename("invoice"), "invoice.pdf");
        assert_eq!(pdf_filename("invoice.PDF"), "invoice.PDF");
        assert_eq!(pdf_filename("invoice.pdf"), "invoice.pdf");
        assert_eq!(pdf_filename("invoice.docx"), "invoice.docx.pdf");
    }

    #[test]
    fn directory_prefixes_are_stripped() {
        assert_eq!(pdf_filename("pdfs/2024/ficha 1"), "ficha 1.pdf");
        assert_eq!(pdf_filename(r"C:\fichas\ficha.pdf"), "ficha.pdf");
    }

    #[test]
    fn trailing_separators_do_not_empty_the_filename() {
        assert_eq!(pdf_filename("fichas/"), "fichas.pdf");
        assert_eq!(pdf_filename("docs\\Layout 12\\ "), "Layout 12.pdf");
        assert_eq!(
            resolve("pdfs/fichas//", "https://h/base").url,
            "https://h/base/fichas.pdf"
        );
    }

    #[test]
    fn non_ascii_is_percent_encoded_as_utf8() {
        let resolved = resolve("Ñandú", "https://h");
        assert_eq!(resolved.url, "https://h/%C3%91and%C3%BA.pdf");
    }
}
