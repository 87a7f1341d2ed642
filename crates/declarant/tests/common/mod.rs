//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use declarant::db::{code_repo, task_repo, Database};
use declarant::UploadStore;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// In-memory database with migrations applied.
pub fn test_db() -> Database {
    Database::open_in_memory().expect("Failed to create test database")
}

/// Fresh upload store rooted in a temp directory.
pub fn test_store(dir: &TempDir) -> UploadStore {
    UploadStore::new(dir.path().join("uploads"))
}

/// Builds a UTF-8 CSV payload with the standard Russian headers.
pub fn csv_payload(rows: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut text = String::from("Наименование,Количество,Единица\n");
    for (name, qty, unit) in rows {
        text.push_str(&format!("{},{},{}\n", name, qty, unit));
    }
    text.into_bytes()
}

/// Writes a CSV file to disk and returns its path.
pub fn write_csv(dir: &TempDir, name: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, csv_payload(rows)).expect("Failed to write CSV fixture");
    path
}

/// Builds a minimal xlsx workbook with inline strings: one sheet, the
/// standard headers, plus the given rows.
pub fn xlsx_payload(rows: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    let mut push_row = |row_number: usize, cells: [&str; 3]| {
        sheet.push_str(&format!("<row r=\"{}\">", row_number));
        for (col, value) in ["A", "B", "C"].iter().zip(cells) {
            sheet.push_str(&format!(
                "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                col, row_number, value
            ));
        }
        sheet.push_str("</row>");
    };
    push_row(1, ["Наименование", "Количество", "Единица"]);
    for (index, (name, qty, unit)) in rows.iter().enumerate() {
        push_row(index + 2, [name, qty, unit]);
    }
    sheet.push_str("</sheetData></worksheet>");

    let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/></sheets>
</workbook>"#;

    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="xml" ContentType="application/xml"/>
</Types>"#;

    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();
        for (name, content) in [
            ("[Content_Types].xml", content_types),
            ("xl/workbook.xml", workbook),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ] {
            writer
                .start_file(name, options)
                .expect("Failed to start zip entry");
            writer
                .write_all(content.as_bytes())
                .expect("Failed to write zip entry");
        }
        writer.finish().expect("Failed to finish zip");
    }
    buffer.into_inner()
}

/// Writes an xlsx file to disk and returns its path.
pub fn write_xlsx(dir: &TempDir, name: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, xlsx_payload(rows)).expect("Failed to write xlsx fixture");
    path
}

/// Inserts a pending task pointing at an existing file.
pub fn insert_task(db: &Database, file_name: &str, file_path: &std::path::Path) -> task_repo::TaskRow {
    let task = task_repo::TaskRow::new("user-1", file_name, &file_path.to_string_lossy());
    task_repo::insert(db, &task).expect("Failed to insert task");
    task
}

/// Seeds the five catalog codes the keyword classifier can produce.
pub fn seed_catalog(db: &Database) {
    for (code, description) in [
        ("8703.10.00", "Автомобили легковые"),
        ("6203.42.31", "Брюки мужские из хлопка"),
        ("0901.11.00", "Кофе не обжаренный"),
        ("8471.30.00", "Машины вычислительные портативные"),
        ("6204.62.31", "Брюки женские из хлопка"),
    ] {
        code_repo::get_or_create(db, code, description, "Товары народного потребления", None)
            .expect("Failed to seed catalog");
    }
}
