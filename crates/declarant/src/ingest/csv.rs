//! CSV reader with encoding detection.
//!
//! Uploads come from desktop spreadsheet exports, so the bytes are tried
//! as UTF-8 first, then the common Cyrillic legacy encoding, then
//! Latin-1. When nothing decodes cleanly the text is recovered lossily
//! and a warning is attached instead of failing the upload.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1251, WINDOWS_1252};

use super::{IngestError, IngestWarning, Table};

/// Decode attempts in priority order.
const ENCODINGS: &[&Encoding] = &[UTF_8, WINDOWS_1251, WINDOWS_1252];

/// Parses a CSV payload into a normalized table.
pub fn read(payload: &[u8]) -> Result<(Table, Vec<IngestWarning>), IngestError> {
    let (text, warnings) = decode(payload);
    let raw = parse_records(&text)?;
    Ok((Table::from_raw(raw), warnings))
}

fn decode(payload: &[u8]) -> (String, Vec<IngestWarning>) {
    for encoding in ENCODINGS {
        let (text, had_errors) = encoding.decode_without_bom_handling(payload);
        if !had_errors {
            return (text.into_owned(), Vec::new());
        }
    }

    let (text, _) = UTF_8.decode_without_bom_handling(payload);
    (text.into_owned(), vec![IngestWarning::PartialDecode])
}

fn parse_records(text: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| IngestError::Unreadable(format!("CSV parse error: {}", e)))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_utf8() {
        let payload = "Наименование,Количество,Единица\nКофе в зернах,10,кг\n".as_bytes();
        let (table, warnings) = read(payload).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(table.headers, vec!["Наименование", "Количество", "Единица"]);
        assert_eq!(table.rows, vec![vec!["Кофе в зернах", "10", "кг"]]);
    }

    #[test]
    fn test_read_windows_1251() {
        let (encoded, _, _) = WINDOWS_1251.encode("Наименование,Кол-во\nКофе,5\n");
        let (table, warnings) = read(&encoded).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(table.headers[0], "Наименование");
        assert_eq!(table.rows[0][0], "Кофе");
    }

    #[test]
    fn test_read_latin1() {
        // 0xE9 is é in ISO-8859-1 and invalid standalone UTF-8, but every
        // byte decodes in windows-1251 too, so the Cyrillic attempt wins.
        let payload = b"name,qty\ncaf\xe9,2\n";
        let (table, warnings) = read(payload).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(table.rows[0][1], "2");
        assert!(!table.rows[0][0].is_empty());
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let payload = b"a,b,c\n1,2\n4,5,6\n";
        let (table, _) = read(payload).unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["4", "5", "6"]);
    }

    #[test]
    fn test_quoted_fields() {
        let payload = b"name,comment\nwidget,\"contains, a comma\"\n";
        let (table, _) = read(payload).unwrap();
        assert_eq!(table.rows[0][1], "contains, a comma");
    }

    #[test]
    fn test_blank_lines_dropped() {
        let payload = b"a,b\n1,2\n\n\n3,4\n";
        let (table, _) = read(payload).unwrap();
        assert_eq!(table.row_count(), 2);
    }
}
