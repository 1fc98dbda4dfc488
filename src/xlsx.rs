//! OOXML spreadsheet (`.xlsx`) decoding into text grids.
//!
//! The workbook is a ZIP container of XML parts. Sheets are listed in
//! document order from `xl/workbook.xml` (resolved through the workbook
//! relationships); every cell value is coerced to text at this boundary so
//! downstream code only sees strings.

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{LookupError, Result};
use crate::models::Grid;

pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Maximum sheets considered in one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells per sheet; larger sheets are rejected, never truncated.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Row numbers above this are rejected (Excel's own limit).
const XLSX_MAX_ROWS: usize = 1_048_576;
/// Column count limit (`XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// A worksheet entry: display name and the ZIP part holding its cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub name: String,
    pub part: String,
}

/// An opened workbook with its shared strings resolved.
pub struct Workbook<'a> {
    archive: zip::ZipArchive<Cursor<&'a [u8]>>,
    shared_strings: Vec<String>,
    sheets: Vec<SheetRef>,
}

fn decode_err(e: impl std::fmt::Display) -> LookupError {
    LookupError::Decode(e.to_string())
}

impl<'a> Workbook<'a> {
    /// Opens the container and reads the sheet list. Fails with
    /// [`LookupError::Decode`] for non-ZIP input or a workbook without sheets.
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(decode_err)?;
        let shared_strings = if has_entry(&archive, SHARED_STRINGS_PART) {
            let xml = read_zip_entry_bounded(&mut archive, SHARED_STRINGS_PART)?;
            parse_shared_strings(&xml)?
        } else {
            Vec::new()
        };
        let mut sheets = list_sheets(&mut archive)?;
        if sheets.is_empty() {
            return Err(LookupError::Decode(
                "workbook contains no worksheets".to_string(),
            ));
        }
        sheets.truncate(XLSX_MAX_SHEETS);
        Ok(Self {
            archive,
            shared_strings,
            sheets,
        })
    }

    pub fn sheets(&self) -> &[SheetRef] {
        &self.sheets
    }

    /// Decodes one sheet into a grid.
    pub fn read_sheet(&mut self, sheet: &SheetRef) -> Result<Grid> {
        let xml = read_zip_entry_bounded(&mut self.archive, &sheet.part)?;
        parse_sheet(&xml, &self.shared_strings)
    }
}

fn has_entry(archive: &zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(decode_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(decode_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(LookupError::Decode(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

fn attr_value(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn list_sheets(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Result<Vec<SheetRef>> {
    if has_entry(archive, WORKBOOK_PART) && has_entry(archive, WORKBOOK_RELS_PART) {
        let workbook = read_zip_entry_bounded(archive, WORKBOOK_PART)?;
        let rels = read_zip_entry_bounded(archive, WORKBOOK_RELS_PART)?;
        let targets = parse_relationships(&rels)?;
        let parts: Vec<String> = archive.file_names().map(str::to_string).collect();
        let sheets = parse_workbook_sheets(&workbook)?
            .into_iter()
            .filter_map(|(name, rid)| {
                targets
                    .iter()
                    .find(|(id, _)| *id == rid)
                    .map(|(_, part)| SheetRef {
                        name,
                        part: part.clone(),
                    })
            })
            .filter(|s| parts.contains(&s.part))
            .collect::<Vec<_>>();
        if !sheets.is_empty() {
            return Ok(sheets);
        }
    }
    Ok(list_worksheet_parts(archive))
}

/// Fallback when the workbook part is missing: worksheet parts in numeric order.
fn list_worksheet_parts(archive: &zip::ZipArchive<Cursor<&[u8]>>) -> Vec<SheetRef> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
        .into_iter()
        .map(|part| SheetRef {
            name: part
                .trim_start_matches("xl/worksheets/")
                .trim_end_matches(".xml")
                .to_string(),
            part,
        })
        .collect()
}

/// `(sheet name, relationship id)` pairs in document order.
fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name").unwrap_or_default();
                if let Some(rid) = attr_value(&e, b"id") {
                    out.push((name, rid));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// `(relationship id, ZIP part)` pairs for worksheet relationships.
fn parse_relationships(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let is_sheet = attr_value(&e, b"Type")
                    .map(|t| t.ends_with("/worksheet"))
                    .unwrap_or(false);
                if let (true, Some(id), Some(target)) =
                    (is_sheet, attr_value(&e, b"Id"), attr_value(&e, b"Target"))
                {
                    let part = match target.strip_prefix('/') {
                        Some(abs) => abs.to_string(),
                        None => format!("xl/{}", target),
                    };
                    out.push((id, part));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Shared string table. Rich-text runs are concatenated; phonetic hints skipped.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(te)) if in_t && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(decode_err)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `"AB12"`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut idx = 0usize;
    for b in letters {
        idx = idx
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A') as usize + 1)?;
    }
    Some(idx - 1)
}

/// Integral floats stored as `123.0` or `1.23E+2` render as `123`.
fn format_number(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains(['.', 'e', 'E']) {
        if let Ok(v) = raw.parse::<f64>() {
            if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                return format!("{}", v as i64);
            }
        }
    }
    raw.to_string()
}

#[derive(Default)]
struct CellState {
    column: Option<usize>,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl CellState {
    fn into_text(self, shared_strings: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .cloned()
                .unwrap_or_default(),
            Some("inlineStr") => self.inline,
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            Some("e") => String::new(),
            Some("str") => self.value,
            _ => format_number(&self.value),
        }
    }
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Grid> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<CellState> = None;
    let mut in_v = false;
    let mut in_inline_t = false;
    let mut cell_count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let target = match attr_value(&e, b"r") {
                        Some(r) => r
                            .trim()
                            .parse::<usize>()
                            .map_err(|_| decode_err(format!("invalid row number: {}", r)))?,
                        None => rows.len() + 1,
                    };
                    if target == 0 || target > XLSX_MAX_ROWS {
                        return Err(decode_err(format!("row number out of range: {}", target)));
                    }
                    while rows.len() + 1 < target {
                        rows.push(Vec::new());
                    }
                    row = Some(Vec::new());
                }
                b"c" => {
                    cell = Some(start_cell(&e)?);
                }
                b"v" => in_v = cell.is_some(),
                b"t" if cell.is_some() => in_inline_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                // A self-closing row still occupies its position.
                if let Some(r) = attr_value(&e, b"r").and_then(|r| r.trim().parse::<usize>().ok())
                {
                    while rows.len() < r.min(XLSX_MAX_ROWS) {
                        rows.push(Vec::new());
                    }
                }
            }
            Ok(Event::Text(te)) => {
                if let Some(c) = cell.as_mut() {
                    if in_v {
                        c.value.push_str(&te.unescape().map_err(decode_err)?);
                    } else if in_inline_t {
                        c.inline.push_str(&te.unescape().map_err(decode_err)?);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"t" => in_inline_t = false,
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        let col = c.column.unwrap_or(r.len());
                        let text = c.into_text(shared_strings);
                        if r.len() <= col {
                            r.resize(col + 1, String::new());
                        }
                        r[col] = text;
                        cell_count += 1;
                        if cell_count > XLSX_MAX_CELLS_PER_SHEET {
                            return Err(LookupError::Decode(format!(
                                "sheet exceeds {} cells",
                                XLSX_MAX_CELLS_PER_SHEET
                            )));
                        }
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_err(e)),
            _ => {}
        }
        buf.clear();
    }

    while rows.last().map(|r| r.is_empty()).unwrap_or(false) {
        rows.pop();
    }
    Ok(Grid::new(rows))
}

fn start_cell(e: &BytesStart<'_>) -> Result<CellState> {
    let column = match attr_value(e, b"r") {
        Some(r) => {
            let col = column_index(&r)
                .ok_or_else(|| decode_err(format!("invalid cell reference: {}", r)))?;
            if col >= XLSX_MAX_COLUMNS {
                return Err(decode_err(format!("column out of range: {}", r)));
            }
            Some(col)
        }
        None => None,
    };
    Ok(CellState {
        column,
        kind: attr_value(e, b"t"),
        ..CellState::default()
    })
}
