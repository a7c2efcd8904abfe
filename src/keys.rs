//! Extraction of context keys embedded in the `Name` column.
//!
//! ADM models configured with additional context dimensions export their
//! `Name` field as a JSON object, e.g.
//! `{"pyName": "OfferA", "pyTreatment": "Bundle"}`. Extraction appends one
//! column per embedded key (canonicalized), leaving rows, row order, and
//! existing columns untouched. Keys that canonicalize to an existing column
//! name (`pyName` -> `Name`) are skipped rather than overwritten.

use itertools::Itertools;
use serde_json::Value as JsonValue;

use crate::data::Value;
use crate::frame::DataFrame;
use crate::schema::{ColumnMeta, ColumnType, canonical_column_name};

/// Decodes JSON-object `Name` cells and appends the embedded keys as new
/// columns. Rows whose `Name` is not a JSON object contribute nulls.
/// A frame without a `Name` column passes through unchanged.
pub fn extract_name_keys(frame: &mut DataFrame) {
    let Some(name_idx) = frame.column_index("Name") else {
        return;
    };

    let decoded: Vec<Option<serde_json::Map<String, JsonValue>>> = frame
        .rows
        .iter()
        .map(|row| {
            row.get(name_idx)
                .and_then(|v| v.as_ref())
                .and_then(decode_embedded_keys)
        })
        .collect();

    let embedded: Vec<String> = decoded
        .iter()
        .flatten()
        .flat_map(|map| map.keys())
        .map(|key| canonical_column_name(key))
        .unique()
        .filter(|canonical| !frame.has_column(canonical))
        .collect();

    for canonical in embedded {
        let values: Vec<Option<Value>> = decoded
            .iter()
            .map(|map| {
                map.as_ref().and_then(|m| {
                    m.iter()
                        .find(|(key, _)| canonical_column_name(key) == canonical)
                        .and_then(|(_, value)| json_to_value(value))
                })
            })
            .collect();
        frame.push_column(
            ColumnMeta {
                name: canonical,
                data_type: ColumnType::String,
            },
            values,
        );
    }
}

fn decode_embedded_keys(value: &Value) -> Option<serde_json::Map<String, JsonValue>> {
    let Value::String(raw) = value else {
        return None;
    };
    if !raw.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(map)) => Some(map),
        _ => None,
    }
}

fn json_to_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(Value::String(s.clone())),
        other => Some(Value::String(other.to_string())),
    }
}
