//! Ingestion boundary: locating export files and reading them into typed
//! frames.
//!
//! The datamart's contract begins at "a tabular dataset or absence". A
//! filename hint that resolves to no file is absence, reported with an
//! info log and `None`, never an error. Column types are inferred by
//! candidate elimination over the whole file, then every cell is parsed
//! into a typed [`Value`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;
use uuid::Uuid;

use crate::data::{parse_snapshot_time, parse_typed_value};
use crate::frame::DataFrame;
use crate::io_utils;
use crate::schema::{ColumnMeta, ColumnType};

/// Resolves `hint` under `base_path` (as-is, then with `.csv` and `.tsv`
/// extensions) and reads the export. Absence yields `Ok(None)`.
pub fn read_ds_export(
    base_path: &Path,
    hint: &str,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Option<DataFrame>> {
    let Some(path) = resolve_export_path(base_path, hint) else {
        info!("No dataset found for '{hint}' under {base_path:?}");
        return Ok(None);
    };
    let delimiter = io_utils::resolve_input_delimiter(&path, delimiter);
    read_frame(&path, delimiter, encoding)
        .map(Some)
        .with_context(|| format!("Reading dataset export {path:?}"))
}

fn resolve_export_path(base_path: &Path, hint: &str) -> Option<PathBuf> {
    let exact = base_path.join(hint);
    if exact.is_file() {
        return Some(exact);
    }
    for extension in ["csv", "tsv"] {
        let candidate = base_path.join(format!("{hint}.{extension}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Reads a delimited file into a typed frame: headers verbatim, types
/// inferred from the data, every cell parsed.
pub fn read_frame(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<DataFrame> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;

    let mut records: Vec<Vec<String>> = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        records.push(io_utils::decode_record(&record, encoding)?);
    }

    let types = infer_column_types(headers.len(), &records);
    let columns = headers
        .into_iter()
        .zip(types)
        .map(|(name, data_type)| ColumnMeta { name, data_type })
        .collect::<Vec<_>>();

    let mut frame = DataFrame::new(columns);
    for (row_idx, record) in records.iter().enumerate() {
        let mut row = Vec::with_capacity(frame.columns.len());
        for (idx, column) in frame.columns.iter().enumerate() {
            let raw = record.get(idx).map(|s| s.as_str()).unwrap_or("");
            let value = parse_typed_value(raw, &column.data_type).with_context(|| {
                format!("Parsing column '{}' in row {}", column.name, row_idx + 2)
            })?;
            row.push(value);
        }
        frame.rows.push(row);
    }
    Ok(frame)
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_datetime: bool,
    possible_guid: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_datetime: true,
            possible_guid: true,
        }
    }

    fn observe(&mut self, value: &str) {
        // Only literal true/false count as boolean evidence: ADM counts
        // are full of 0/1 columns that must stay numeric.
        if self.possible_boolean && !matches!(value.to_ascii_lowercase().as_str(), "true" | "false")
        {
            self.possible_boolean = false;
        }
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
        if self.possible_datetime && parse_snapshot_time(value).is_err() {
            self.possible_datetime = false;
        }
        if self.possible_guid {
            let trimmed = value.trim().trim_matches(|c| matches!(c, '{' | '}'));
            if Uuid::parse_str(trimmed).is_err() {
                self.possible_guid = false;
            }
        }
    }

    fn decide(&self) -> ColumnType {
        if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_datetime {
            ColumnType::DateTime
        } else if self.possible_guid {
            ColumnType::Guid
        } else {
            ColumnType::String
        }
    }
}

fn infer_column_types(width: usize, records: &[Vec<String>]) -> Vec<ColumnType> {
    let mut candidates = vec![TypeCandidate::new(); width];
    for record in records {
        for (idx, field) in record.iter().enumerate().take(width) {
            if field.is_empty() {
                continue;
            }
            candidates[idx].observe(field);
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}
