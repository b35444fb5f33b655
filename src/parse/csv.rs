//! Delimiter-separated text parsing (CSV, TSV, and the .txt call-report files).

use super::ParsedTable;
use crate::error::{Result, TabloadError};
use crate::record::{normalize_headers, Record};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Parse a delimiter-separated file: first row is the header, every
/// subsequent row becomes one record.
///
/// Rows whose field count differs from the header are skipped and counted.
/// Fields are decoded lossily, so files with stray latin1 bytes still load
/// instead of failing the whole archive. Empty cells become JSON null; all
/// other values stay text and the remote schema coerces types.
pub fn parse_csv(path: &Path, delimiter: u8) -> Result<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| TabloadError::MalformedInput(format!("{}: {}", path.display(), e)))?;

    let mut rows = reader.byte_records();

    let header_row = match rows.next() {
        Some(row) => row.map_err(|e| {
            TabloadError::MalformedInput(format!("{} header: {}", path.display(), e))
        })?,
        None => {
            return Err(TabloadError::MalformedInput(format!(
                "{}: file has no header row",
                path.display()
            )))
        }
    };

    let headers = normalize_headers(
        header_row
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned()),
    );
    if headers.iter().all(|h| h.is_empty()) {
        return Err(TabloadError::MalformedInput(format!(
            "{}: header row is empty",
            path.display()
        )));
    }

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for (idx, row) in rows.enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                log::warn!("{} row {}: {}", path.display(), idx + 2, e);
                skipped_rows += 1;
                continue;
            }
        };

        if row.len() != headers.len() {
            log::warn!(
                "{} row {}: expected {} fields, found {} (skipped)",
                path.display(),
                idx + 2,
                headers.len(),
                row.len()
            );
            skipped_rows += 1;
            continue;
        }

        let mut record = Record::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            let text = String::from_utf8_lossy(field);
            let trimmed = text.trim();
            let value = if trimmed.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(trimmed.to_string())
            };
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    Ok(ParsedTable {
        sheet: None,
        records,
        skipped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_csv_basic() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "users.csv", b"id,name\n1,Alice\n2,Bob\n");

        let table = parse_csv(&path, b',').unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.skipped_rows, 0);
        assert_eq!(table.records[0]["id"], "1");
        assert_eq!(table.records[0]["name"], "Alice");
        assert_eq!(table.records[1]["name"], "Bob");
    }

    #[test]
    fn test_parse_csv_skips_malformed_rows() {
        let temp = TempDir::new().unwrap();
        // Second data row has an extra column
        let path = write_file(&temp, "bad.csv", b"id,name\n1,Alice\n2,Bob,extra\n3,Carol\n");

        let table = parse_csv(&path, b',').unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.records[1]["id"], "3");
    }

    #[test]
    fn test_parse_csv_normalizes_headers_and_empty_cells() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "r.csv", b"CU Number, CU-NAME\n123,\n");

        let table = parse_csv(&path, b',').unwrap();
        let record = &table.records[0];
        assert_eq!(record["cu_number"], "123");
        assert!(record["cu_name"].is_null());
    }

    #[test]
    fn test_parse_tsv_delimiter() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "t.tsv", b"a\tb\n1\t2\n");

        let table = parse_csv(&path, b'\t').unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0]["b"], "2");
    }

    #[test]
    fn test_parse_csv_non_utf8_bytes() {
        let temp = TempDir::new().unwrap();
        // 0xE9 is latin1 'é'; the lossy decode must not fail the file
        let path = write_file(&temp, "latin.csv", b"name\nRen\xe9e\n");

        let table = parse_csv(&path, b',').unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.skipped_rows, 0);
        let name = table.records[0]["name"].as_str().unwrap();
        assert!(name.starts_with("Ren"));
    }

    #[test]
    fn test_parse_csv_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "empty.csv", b"");

        let err = parse_csv(&path, b',').unwrap_err();
        assert!(matches!(err, TabloadError::MalformedInput(_)));
    }

    #[test]
    fn test_parse_csv_header_only() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "h.csv", b"id,name\n");

        let table = parse_csv(&path, b',').unwrap();
        assert!(table.records.is_empty());
        assert_eq!(table.skipped_rows, 0);
    }
}
