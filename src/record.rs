//! Flat row records and destination table naming.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;

/// One flat key-value row, as produced by the format parsers.
///
/// Serializes directly as a single JSON object inside the insert body.
pub type Record = serde_json::Map<String, JsonValue>;

/// Reporting period parsed from an archive filename (e.g. "call-report-2024-03.zip").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub year: u16,
    pub month: u8,
}

impl Period {
    /// Extract a YYYY-MM period from a filename, if present.
    pub fn from_file_name(name: &str) -> Option<Period> {
        let period_regex = Regex::new(r"(\d{4})-(\d{2})").expect("Invalid regex pattern");
        let cap = period_regex.captures(name)?;
        let year: u16 = cap.get(1).unwrap().as_str().parse().ok()?;
        let month: u8 = cap.get(2).unwrap().as_str().parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Period { year, month })
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Leading zero on the month is preserved in table suffixes
        write!(f, "{}_{:02}", self.year, self.month)
    }
}

/// Normalize one field name: trim, lowercase, spaces and dashes to underscores.
///
/// The same logical column must map to the same field name across files,
/// and the remote side rejects names with spaces or mixed case.
pub fn normalize_field(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Normalize a header row, deduplicating repeated names with `_1`, `_2`, ... suffixes.
///
/// Source files occasionally repeat a column name; without the suffix the
/// later column would silently overwrite the earlier one in each record.
pub fn normalize_headers<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::new();
    for name in names {
        let clean = normalize_field(name.as_ref());
        match seen.get_mut(&clean) {
            Some(count) => {
                *count += 1;
                headers.push(format!("{}_{}", clean, count));
            }
            None => {
                seen.insert(clean.clone(), 0);
                headers.push(clean);
            }
        }
    }
    headers
}

/// Derive the destination table name for an extracted data file.
///
/// The base name is the sanitized file stem (optionally combined with an
/// Excel sheet name), overridden by the `[tables]` config mapping when an
/// entry for the stem exists. When the source archive carries a reporting
/// period, it is appended so each period lands in its own table.
pub fn table_target(
    file_path: &Path,
    sheet: Option<&str>,
    period: Option<Period>,
    overrides: &HashMap<String, String>,
) -> String {
    let stem = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");

    let mut base = match overrides.get(stem) {
        Some(mapped) => mapped.clone(),
        None => sanitize_identifier(stem),
    };

    if let Some(sheet) = sheet {
        base = format!("{}_{}", base, sanitize_identifier(sheet));
    }

    match period {
        Some(p) => format!("{}_{}", base, p),
        None => base,
    }
}

/// Reduce an arbitrary name to a safe SQL identifier: lowercase with only
/// `[a-z0-9_]`, runs of other characters collapsed to single underscores.
fn sanitize_identifier(name: &str) -> String {
    let invalid = Regex::new(r"[^a-z0-9_]+").expect("Invalid regex pattern");
    let lowered = name.trim().to_lowercase();
    let cleaned = invalid.replace_all(&lowered, "_");
    cleaned.trim_matches('_').to_string()
}
