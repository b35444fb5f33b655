pub mod csv;
pub mod excel;
pub mod json;

use crate::error::{Result, TabloadError};
use crate::record::Record;
use std::path::Path;

/// Supported input formats, selected by a pure extension lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimiter-separated text (comma for .csv/.txt, tab for .tsv)
    Csv { delimiter: u8 },
    Json,
    Excel,
}

impl FileFormat {
    /// Determine the format from the file extension, if supported.
    pub fn from_path(path: &Path) -> Option<FileFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            // The call-report archives ship comma-separated data as .txt
            "csv" | "txt" => Some(FileFormat::Csv { delimiter: b',' }),
            "tsv" => Some(FileFormat::Csv { delimiter: b'\t' }),
            "json" => Some(FileFormat::Json),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(FileFormat::Excel),
            _ => None,
        }
    }
}

/// One table-shaped slice of a parsed file.
///
/// CSV and JSON files yield exactly one; an Excel workbook yields one per
/// sheet, with the sheet name carried so the table target can include it.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub sheet: Option<String>,
    pub records: Vec<Record>,
    /// Structurally bad rows dropped during parsing (counted, not fatal).
    pub skipped_rows: usize,
}

/// Parse one extracted file into table-shaped record lists.
///
/// Fails with `UnsupportedFormat` for unrecognized extensions and
/// `MalformedInput` when the file cannot be decoded at all; individually
/// bad rows are skipped and counted in the returned tables instead.
pub fn parse_file(path: &Path) -> Result<Vec<ParsedTable>> {
    let format = FileFormat::from_path(path)
        .ok_or_else(|| TabloadError::UnsupportedFormat(path.display().to_string()))?;

    match format {
        FileFormat::Csv { delimiter } => Ok(vec![csv::parse_csv(path, delimiter)?]),
        FileFormat::Json => Ok(vec![json::parse_json(path)?]),
        FileFormat::Excel => excel::parse_workbook(path),
    }
}
