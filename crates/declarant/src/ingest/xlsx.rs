//! XLSX workbook reader.
//!
//! An xlsx file is a zip archive of XML parts. The cells of the first
//! worksheet are streamed with `quick-xml`; string cells reference the
//! shared-strings part by index, so that part is parsed first.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{IngestError, Table};

/// Parses an xlsx payload into a normalized table.
pub fn read(payload: &[u8]) -> Result<Table, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(payload))
        .map_err(|e| IngestError::Unreadable(format!("not an xlsx archive: {}", e)))?;

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Some(xml) => parse_shared_strings(&xml?)?,
        None => Vec::new(),
    };

    let sheet_name = first_sheet_name(&archive).ok_or_else(|| {
        IngestError::Unreadable("archive contains no worksheets".to_string())
    })?;
    let sheet_xml = match read_part(&mut archive, &sheet_name) {
        Some(xml) => xml?,
        None => return Err(IngestError::Unreadable("worksheet part missing".to_string())),
    };

    let raw = parse_sheet(&sheet_xml, &shared)?;
    Ok(Table::from_raw(raw))
}

fn read_part(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Option<Result<String, IngestError>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return None,
        Err(e) => {
            return Some(Err(IngestError::Unreadable(format!(
                "failed to open {}: {}",
                name, e
            ))))
        }
    };

    let mut xml = String::new();
    if let Err(e) = part.read_to_string(&mut xml) {
        return Some(Err(IngestError::Unreadable(format!(
            "failed to read {}: {}",
            name, e
        ))));
    }
    Some(Ok(xml))
}

/// First worksheet part, lowest sheet number first.
fn first_sheet_name(archive: &zip::ZipArchive<Cursor<&[u8]>>) -> Option<String> {
    let mut sheets: Vec<&str> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .collect();
    sheets.sort();
    sheets.first().map(|s| s.to_string())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    let decoded = e.unescape().map_err(|e| {
                        IngestError::Unreadable(format!("shared strings XML: {}", e))
                    })?;
                    current.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Unreadable(format!(
                    "shared strings XML: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Raw,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_column: usize = 0;
    let mut cell_type = CellType::Raw;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type = CellType::Raw;
                    cell_column = row.len();
                    value.clear();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                if let Some(col) = column_from_reference(&attr.value) {
                                    cell_column = col;
                                }
                            }
                            b"t" => {
                                cell_type = match attr.value.as_ref() {
                                    b"s" => CellType::Shared,
                                    b"inlineStr" => CellType::Inline,
                                    _ => CellType::Raw,
                                };
                            }
                            _ => {}
                        }
                    }
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"row" => rows.push(std::mem::take(&mut row)),
                b"c" => {
                    let resolved = match cell_type {
                        CellType::Shared => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default(),
                        CellType::Inline | CellType::Raw => std::mem::take(&mut value),
                    };
                    // Pad over gap cells skipped in the XML.
                    while row.len() < cell_column {
                        row.push(String::new());
                    }
                    row.push(resolved);
                    value.clear();
                }
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_value {
                    let decoded = e
                        .unescape()
                        .map_err(|e| IngestError::Unreadable(format!("worksheet XML: {}", e)))?;
                    value.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Unreadable(format!("worksheet XML: {}", e)))
            }
            _ => {}
        }
    }

    Ok(rows)
}

/// Column index from an A1-style cell reference ("C5" is column 2).
fn column_from_reference(reference: &[u8]) -> Option<usize> {
    let letters: Vec<u8> = reference
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for letter in letters {
        index = index * 26 + (letter - b'A' + 1) as usize;
    }
    Some(index - 1)
}
