//! Upload validation, run before a task is created.
//!
//! Errors block submission; warnings are advisory and travel with the
//! report. An unreadable payload is a warning, not an error, so the
//! failure is recorded on the task by the pipeline rather than lost at
//! the upload boundary.

use super::{read_table_from_bytes, ColumnMap, ContentKind, IngestWarning};

/// 10 MiB upload ceiling.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Row-count bounds for a single task.
pub const MAX_ROWS: usize = 1000;
pub const FEW_ROWS_THRESHOLD: usize = 5;
pub const FEW_COLUMNS_THRESHOLD: usize = 3;

/// Outcome of validating one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rows: usize,
    pub size_mb: f64,
}

/// Validates an upload payload against size, type, and shape rules.
pub fn validate(file_name: &str, payload: &[u8]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut rows = 0;

    let size_mb = (payload.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
    if payload.len() as u64 > MAX_FILE_SIZE {
        errors.push(format!(
            "File too large: {:.2} MB (maximum {} MB)",
            size_mb,
            MAX_FILE_SIZE / (1024 * 1024)
        ));
    }

    let kind = ContentKind::from_file_name(file_name);
    if kind.is_none() {
        errors.push(format!(
            "Unsupported file type: {} (expected xlsx, xls, or csv)",
            file_name
        ));
    }

    if let Some(kind) = kind {
        match read_table_from_bytes(kind, payload) {
            Ok((table, ingest_warnings)) => {
                rows = table.row_count();
                for warning in &ingest_warnings {
                    if *warning == IngestWarning::PartialDecode {
                        warnings.push(warning.to_string());
                    }
                }

                if rows == 0 {
                    errors.push("File contains no data rows".to_string());
                } else if rows > MAX_ROWS {
                    errors.push(format!(
                        "Too many rows: {} (maximum {})",
                        rows, MAX_ROWS
                    ));
                } else if rows < FEW_ROWS_THRESHOLD {
                    warnings.push(format!("File contains only {} data rows", rows));
                }

                if table.column_count() > 0 && table.column_count() < FEW_COLUMNS_THRESHOLD {
                    warnings.push(format!(
                        "File contains only {} columns",
                        table.column_count()
                    ));
                }

                let columns = ColumnMap::detect(&table.headers);
                if columns.name.is_none() {
                    warnings.push("No product name column recognized".to_string());
                }
                if columns.quantity.is_none() {
                    warnings.push("No quantity column recognized".to_string());
                }
                if columns.unit.is_none() {
                    warnings.push("No unit column recognized".to_string());
                }
            }
            Err(e) => {
                // The task is still created; the run will fail with the
                // same reason and record it on the task.
                warnings.push(format!(
                    "File could not be parsed as {}: {}",
                    kind.mime(),
                    e
                ));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        rows,
        size_mb,
    }
}
