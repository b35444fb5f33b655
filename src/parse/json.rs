//! JSON file parsing into flat records.
//!
//! Flattening policy: nested objects are inlined with dotted field names
//! ("address.city"); nested arrays are serialized into a single compact JSON
//! text field. Arrays never expand into repeated records, so the record
//! count always equals the number of top-level elements.

use super::ParsedTable;
use crate::error::{Result, TabloadError};
use crate::record::{normalize_field, Record};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Parse a JSON file holding either a top-level array of objects (one record
/// per element) or a single object (one record).
pub fn parse_json(path: &Path) -> Result<ParsedTable> {
    let content = std::fs::read_to_string(path)?;
    let value: JsonValue = serde_json::from_str(&content)
        .map_err(|e| TabloadError::MalformedInput(format!("{}: {}", path.display(), e)))?;

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    match value {
        JsonValue::Array(elements) => {
            for (idx, element) in elements.into_iter().enumerate() {
                match element {
                    JsonValue::Object(map) => records.push(flatten_object(map)),
                    other => {
                        log::warn!(
                            "{} element {}: expected object, found {} (skipped)",
                            path.display(),
                            idx,
                            type_name(&other)
                        );
                        skipped_rows += 1;
                    }
                }
            }
        }
        JsonValue::Object(map) => records.push(flatten_object(map)),
        other => {
            return Err(TabloadError::MalformedInput(format!(
                "{}: top-level value must be an object or array of objects, found {}",
                path.display(),
                type_name(&other)
            )))
        }
    }

    Ok(ParsedTable {
        sheet: None,
        records,
        skipped_rows,
    })
}

/// Flatten one JSON object into a flat record.
fn flatten_object(map: serde_json::Map<String, JsonValue>) -> Record {
    let mut record = Record::new();
    for (key, value) in map {
        flatten_value(&normalize_field(&key), value, &mut record);
    }
    record
}

fn flatten_value(prefix: &str, value: JsonValue, out: &mut Record) {
    match value {
        JsonValue::Object(map) => {
            for (key, nested) in map {
                let field = format!("{}.{}", prefix, normalize_field(&key));
                flatten_value(&field, nested, out);
            }
        }
        JsonValue::Array(_) => {
            // to_string on a Value cannot fail
            let serialized = value.to_string();
            out.insert(prefix.to_string(), JsonValue::String(serialized));
        }
        scalar => {
            out.insert(prefix.to_string(), scalar);
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
