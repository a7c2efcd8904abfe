//! Column-name canonicalization and schema persistence.
//!
//! ADM exports arrive with vendor-cased column names (`pyName`,
//! `pxResponseCount`, `MODELID`, ...). Every dataset entering the datamart
//! passes through [`normalize_columns`] first so that all later operations
//! can reference one canonical capitalization scheme.

use std::{fs::File, io::BufReader, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use heck::ToUpperCamelCase;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::frame::DataFrame;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Guid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnType,
}

/// Canonical capitalizations for the column names ADM telemetry uses.
/// Lookup is case-insensitive after the vendor prefix is stripped.
const CANONICAL_NAMES: &[&str] = &[
    "ModelID",
    "Positives",
    "Negatives",
    "ResponseCount",
    "SnapshotTime",
    "Name",
    "Channel",
    "Direction",
    "Issue",
    "Group",
    "Treatment",
    "Configuration",
    "AppliesToClass",
    "Performance",
    "TotalPredictors",
    "ActivePredictors",
    "ModelTechnique",
    "PredictorName",
    "PredictorCategory",
    "EntryType",
    "Type",
    "Propensity",
    "TotalBins",
    "BinIndex",
    "BinSymbol",
    "BinType",
    "BinLowerBound",
    "BinUpperBound",
    "BinPositives",
    "BinNegatives",
    "BinResponseCount",
    "BinPropensity",
    "BinAdjustedPropensity",
    "Contents",
    "GroupIndex",
];

fn vendor_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"(?i)^p[xyz]").expect("valid regex"))
}

/// Maps a raw export column name onto its canonical capitalization.
///
/// `pyName` -> `Name`, `pxresponsecount` -> `ResponseCount`; names outside
/// the canonical table fall back to UpperCamelCase.
pub fn canonical_column_name(raw: &str) -> String {
    let stripped = vendor_prefix().replace(raw.trim(), "");
    let lowered = stripped.to_ascii_lowercase();
    for canonical in CANONICAL_NAMES {
        if canonical.to_ascii_lowercase() == lowered {
            return (*canonical).to_string();
        }
    }
    stripped.to_upper_camel_case()
}

/// Renames every column of `frame` to its canonical form. Pure rename:
/// row count, row order, and cell content are untouched.
pub fn normalize_columns(mut frame: DataFrame) -> DataFrame {
    for column in &mut frame.columns {
        column.name = canonical_column_name(&column.name);
    }
    frame
}

/// On-disk schema document written by `probe` and consumed by tooling that
/// wants typed reads without re-inferring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    pub fn from_frame(frame: &DataFrame) -> Self {
        Schema {
            columns: frame.columns.clone(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_column_name_strips_vendor_prefixes() {
        assert_eq!(canonical_column_name("pyName"), "Name");
        assert_eq!(canonical_column_name("pyIssue"), "Issue");
        assert_eq!(canonical_column_name("pzModelID"), "ModelID");
        assert_eq!(canonical_column_name("pxResponseCount"), "ResponseCount");
    }

    #[test]
    fn canonical_column_name_is_case_insensitive() {
        assert_eq!(canonical_column_name("MODELID"), "ModelID");
        assert_eq!(canonical_column_name("snapshottime"), "SnapshotTime");
        assert_eq!(
            canonical_column_name("binadjustedpropensity"),
            "BinAdjustedPropensity"
        );
    }

    #[test]
    fn canonical_column_name_leaves_positives_alone() {
        // Starts with 'p' but carries no vendor prefix.
        assert_eq!(canonical_column_name("Positives"), "Positives");
        assert_eq!(canonical_column_name("positives"), "Positives");
    }

    #[test]
    fn canonical_column_name_falls_back_to_upper_camel() {
        assert_eq!(canonical_column_name("snapshot_age_days"), "SnapshotAgeDays");
        assert_eq!(canonical_column_name("pyCustomField"), "CustomField");
    }

    #[test]
    fn canonical_column_name_is_idempotent() {
        for raw in ["pyName", "ResponseCount", "snapshot_age_days"] {
            let once = canonical_column_name(raw);
            assert_eq!(canonical_column_name(&once), once);
        }
    }
}
