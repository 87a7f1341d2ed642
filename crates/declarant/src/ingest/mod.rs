//! Spreadsheet ingestion.
//!
//! Turns uploaded payloads (xlsx, xls, csv) into a normalized [`Table`]
//! the pipeline can iterate, and validates uploads before a task is
//! created.

use std::path::Path;

use thiserror::Error;

pub mod csv;
pub mod validate;
pub mod xlsx;

pub use validate::{validate, ValidationReport};

/// Upload formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Xlsx,
    Xls,
    Csv,
}

impl ContentKind {
    /// Detects the kind from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// The MIME type reported for this kind in validation messages.
    pub fn mime(&self) -> String {
        let extension = match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        };
        mime_guess::from_ext(extension)
            .first_or_octet_stream()
            .to_string()
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File could not be parsed: {0}")]
    Unreadable(String),
}

/// Non-fatal ingestion findings surfaced alongside the parsed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// No declared encoding decoded cleanly; replacement characters were
    /// substituted for undecodable bytes.
    PartialDecode,
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartialDecode => write!(
                f,
                "File encoding could not be fully determined; some characters were replaced"
            ),
        }
    }
}

/// A parsed spreadsheet: a header row plus data rows, all cells as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Normalizes raw parsed rows: the first row becomes the header,
    /// fully blank rows and columns are dropped, cells are trimmed and
    /// short rows padded to the header width.
    pub fn from_raw(mut raw: Vec<Vec<String>>) -> Self {
        for row in &mut raw {
            for cell in row.iter_mut() {
                let trimmed = cell.trim();
                if trimmed.len() != cell.len() {
                    *cell = trimmed.to_string();
                }
            }
        }
        raw.retain(|row| row.iter().any(|cell| !cell.is_empty()));

        if raw.is_empty() {
            return Self {
                headers: Vec::new(),
                rows: Vec::new(),
            };
        }

        let width = raw.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut raw {
            row.resize(width, String::new());
        }

        // A column is blank when neither its header nor any data cell
        // carries a value.
        let keep: Vec<bool> = (0..width)
            .map(|col| raw.iter().any(|row| !row[col].is_empty()))
            .collect();

        let mut rows: Vec<Vec<String>> = raw
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&keep)
                    .filter_map(|(cell, keep)| keep.then_some(cell))
                    .collect()
            })
            .collect();

        let headers = rows.remove(0);
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell value at (row, column), empty string when out of range.
    pub fn value(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Header keywords for the product-name column, checked as substrings of
/// the lower-cased header.
const NAME_KEYWORDS: &[&str] = &[
    "наименование",
    "товар",
    "продукт",
    "name",
    "product",
    "description",
];
const QUANTITY_KEYWORDS: &[&str] = &["количество", "кол-во", "qty", "quantity"];
const UNIT_KEYWORDS: &[&str] = &["единица", "ед.", "unit", "мера"];

/// Column indices for the concepts the pipeline needs, resolved from
/// header keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub quantity: Option<usize>,
    pub unit: Option<usize>,
}

impl ColumnMap {
    pub fn detect(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let find = |keywords: &[&str]| {
            lowered
                .iter()
                .position(|header| keywords.iter().any(|kw| header.contains(kw)))
        };
        Self {
            name: find(NAME_KEYWORDS),
            quantity: find(QUANTITY_KEYWORDS),
            unit: find(UNIT_KEYWORDS),
        }
    }
}

/// Parses an uploaded payload into a normalized table.
pub fn read_table_from_bytes(
    kind: ContentKind,
    payload: &[u8],
) -> Result<(Table, Vec<IngestWarning>), IngestError> {
    match kind {
        // Legacy .xls payloads are attempted with the same reader; a
        // genuine binary workbook fails as Unreadable.
        ContentKind::Xlsx | ContentKind::Xls => {
            let table = xlsx::read(payload)?;
            Ok((table, Vec::new()))
        }
        ContentKind::Csv => csv::read(payload),
    }
}

/// Reads and parses the file at `path`, detecting the kind from its
/// extension.
pub fn read_table(path: &Path) -> Result<(Table, Vec<IngestWarning>), IngestError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let kind = ContentKind::from_file_name(name)
        .ok_or_else(|| IngestError::UnsupportedType(name.to_string()))?;

    let payload = std::fs::read(path).map_err(|e| IngestError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    read_table_from_bytes(kind, &payload)
}
