//! Excel workbook parsing via calamine.
//!
//! Each sheet is an independent table-like source mirroring the CSV
//! semantics: first non-empty row is the header, subsequent rows become
//! records.

use super::ParsedTable;
use crate::error::{Result, TabloadError};
use crate::record::{normalize_headers, Record};
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Parse every sheet of a workbook into its own `ParsedTable`.
///
/// Sheets without a header row (fully empty) yield no table. A workbook
/// that cannot be opened fails with `MalformedInput`.
pub fn parse_workbook(path: &Path) -> Result<Vec<ParsedTable>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| TabloadError::MalformedInput(format!("{}: {}", path.display(), e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut tables = Vec::new();

    for sheet in sheet_names {
        let range = workbook.worksheet_range(&sheet).map_err(|e| {
            TabloadError::MalformedInput(format!("{} sheet '{}': {}", path.display(), sheet, e))
        })?;

        if let Some(table) = parse_sheet(&sheet, &range) {
            tables.push(table);
        } else {
            log::debug!("{} sheet '{}': no header row, skipping", path.display(), sheet);
        }
    }

    Ok(tables)
}

/// Parse one sheet range. Returns None when the sheet has no non-empty row.
fn parse_sheet(sheet: &str, range: &Range<Data>) -> Option<ParsedTable> {
    let header_idx = range
        .rows()
        .position(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))?;

    let header_row = range.rows().nth(header_idx)?;
    // The range is rectangular; drop trailing empty header cells so data
    // rows spilling past the real header are detectable below.
    let header_width = header_row
        .iter()
        .rposition(|cell| !matches!(cell, Data::Empty))?
        + 1;
    let header_row = &header_row[..header_width];
    let headers = normalize_headers(header_row.iter().enumerate().map(|(i, cell)| {
        let name = cell_to_text(cell);
        if name.is_empty() {
            format!("column_{}", i)
        } else {
            name
        }
    }));

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for row in range.rows().skip(header_idx + 1) {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            skipped_rows += 1;
            continue;
        }

        // Non-empty data beyond the header width means the row does not fit
        // the table shape; skip it rather than invent column names.
        if row.len() > headers.len()
            && row[headers.len()..].iter().any(|c| !matches!(c, Data::Empty))
        {
            log::warn!(
                "sheet '{}': row wider than header ({} > {}), skipped",
                sheet,
                row.len(),
                headers.len()
            );
            skipped_rows += 1;
            continue;
        }

        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).unwrap_or(&Data::Empty);
            record.insert(header.clone(), cell_to_value(cell));
        }
        records.push(record);
    }

    Some(ParsedTable {
        sheet: Some(sheet.to_string()),
        records,
        skipped_rows,
    })
}

/// Convert a cell into the JSON value stored in a record.
fn cell_to_value(cell: &Data) -> JsonValue {
    match cell {
        Data::Empty => JsonValue::Null,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(trimmed.to_string())
            }
        }
        Data::Int(i) => JsonValue::from(*i),
        Data::Float(f) => {
            // Whole floats are what Excel stores integers as; keep them integral
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                JsonValue::from(*f as i64)
            } else {
                JsonValue::from(*f)
            }
        }
        Data::Bool(b) => JsonValue::Bool(*b),
        Data::DateTime(dt) => JsonValue::String(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => JsonValue::String(s.clone()),
        Data::Error(_) => JsonValue::Null,
    }
}

/// Text rendering used for header cells.
fn cell_to_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_from(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn test_parse_sheet_basic() {
        let range = range_from(vec![
            vec![s("ID"), s("Name")],
            vec![Data::Float(1.0), s("Alice")],
            vec![Data::Float(2.0), s("Bob")],
        ]);

        let table = parse_sheet("Sheet1", &range).unwrap();
        assert_eq!(table.sheet.as_deref(), Some("Sheet1"));
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.skipped_rows, 0);
        assert_eq!(table.records[0]["id"], 1);
        assert_eq!(table.records[1]["name"], "Bob");
    }

    #[test]
    fn test_parse_sheet_header_after_blank_rows() {
        let range = range_from(vec![
            vec![Data::Empty, Data::Empty],
            vec![s("a"), s("b")],
            vec![Data::Float(1.5), Data::Bool(true)],
        ]);

        let table = parse_sheet("Data", &range).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0]["a"], 1.5);
        assert_eq!(table.records[0]["b"], true);
    }

    #[test]
    fn test_parse_sheet_skips_empty_and_wide_rows() {
        let range = range_from(vec![
            vec![s("a"), s("b"), Data::Empty],
            vec![Data::Float(1.0), Data::Float(2.0), Data::Empty],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![Data::Float(3.0), Data::Float(4.0), s("overflow")],
        ]);

        let table = parse_sheet("Sheet1", &range).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.skipped_rows, 2);
    }

    #[test]
    fn test_parse_sheet_empty_sheet() {
        let range = range_from(vec![vec![Data::Empty, Data::Empty]]);
        assert!(parse_sheet("Empty", &range).is_none());
    }

    #[test]
    fn test_cell_to_value_conversions() {
        assert_eq!(cell_to_value(&Data::Empty), JsonValue::Null);
        assert_eq!(cell_to_value(&s("  x  ")), "x");
        assert_eq!(cell_to_value(&s("   ")), JsonValue::Null);
        assert_eq!(cell_to_value(&Data::Float(3.0)), 3);
        assert_eq!(cell_to_value(&Data::Float(3.25)), 3.25);
        assert_eq!(cell_to_value(&Data::Int(7)), 7);
        assert_eq!(cell_to_value(&Data::Bool(false)), false);
    }
}
