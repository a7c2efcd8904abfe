//! Datamart assembly: validation pipelines, context keys, and the
//! combined model/predictor view.
//!
//! A [`Datamart`] owns its datasets for its lifetime. Construction wires
//! up the validation pipelines once; re-running the pipeline means
//! constructing a new instance. Either input may be absent, in which case
//! the matching accessor stays absent and everything else degrades
//! gracefully.

use std::path::{Path, PathBuf};

use anyhow::Context;
use encoding_rs::Encoding;
use log::info;

use crate::cache;
use crate::categorize::{Categorization, default_name_prefix};
use crate::derive;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;
use crate::ingest;
use crate::lazy::LazyFrame;
use crate::query::QueryExpr;
use crate::schema::{ColumnType, normalize_columns};

/// The fixed candidate grouping dimensions, in canonical order.
/// `Treatment` joins the list only when the model schema carries it.
pub const CONTEXT_KEY_CANDIDATES: [&str; 5] = ["Channel", "Direction", "Issue", "Group", "Name"];

const JOIN_SUFFIX: &str = "Bin";

#[derive(Debug, Clone)]
pub struct DatamartOptions {
    /// Filter predicates applied to the model dataset, model-side only.
    pub query: Vec<QueryExpr>,
    /// Whether to decode JSON-object `Name` cells into key columns.
    pub extract_name_keys: bool,
    /// Predictor categorization strategy; `None` means a default
    /// name-prefix rule constructed at the point of use.
    pub categorization: Option<Categorization>,
}

impl Default for DatamartOptions {
    fn default() -> Self {
        DatamartOptions {
            query: Vec::new(),
            extract_name_keys: true,
            categorization: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Datamart {
    model_data: Option<LazyFrame>,
    predictor_data: Option<LazyFrame>,
    context_keys: Vec<String>,
}

impl Datamart {
    pub fn new(
        model: Option<DataFrame>,
        predictor: Option<DataFrame>,
        options: DatamartOptions,
    ) -> Result<Self> {
        let DatamartOptions {
            query,
            extract_name_keys,
            categorization,
        } = options;
        let (model_data, context_keys) = validate_model_data(model, query, extract_name_keys)?;
        let predictor_data = validate_predictor_data(predictor, categorization)?;
        Ok(Datamart {
            model_data,
            predictor_data,
            context_keys,
        })
    }

    /// Reads the two exports under `base_path` (hints default to
    /// `model_data` / `predictor_data`) and constructs the datamart.
    pub fn from_ds_export(
        base_path: &Path,
        model_hint: Option<&str>,
        predictor_hint: Option<&str>,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
        options: DatamartOptions,
    ) -> anyhow::Result<Self> {
        let model = ingest::read_ds_export(
            base_path,
            model_hint.unwrap_or("model_data"),
            delimiter,
            encoding,
        )
        .context("Reading model data export")?;
        let predictor = ingest::read_ds_export(
            base_path,
            predictor_hint.unwrap_or("predictor_data"),
            delimiter,
            encoding,
        )
        .context("Reading predictor data export")?;
        Ok(Datamart::new(model, predictor, options)?)
    }

    pub fn model_data(&self) -> Option<&LazyFrame> {
        self.model_data.as_ref()
    }

    pub fn predictor_data(&self) -> Option<&LazyFrame> {
        self.predictor_data.as_ref()
    }

    /// The effective grouping dimensions, fixed at construction.
    pub fn context_keys(&self) -> &[String] {
        &self.context_keys
    }

    /// The joined model/predictor view. Rebuilt lazily on every call and
    /// absent whenever either source is absent. The join keys on
    /// `ModelID`, refined by `SnapshotTime` when both schemas carry it.
    pub fn combined_data(&self) -> Option<LazyFrame> {
        let (model, predictor) = match (&self.model_data, &self.predictor_data) {
            (Some(model), Some(predictor)) => (model, predictor),
            _ => return None,
        };
        let mut on = vec!["ModelID".to_string()];
        if model.source().has_column("SnapshotTime") && predictor.source().has_column("SnapshotTime")
        {
            on.push("SnapshotTime".to_string());
        }
        Some(model.join(predictor, on, JOIN_SUFFIX))
    }

    /// Persists whichever datasets are present under `path`. Materializes
    /// the pipelines; see [`cache::save_data`] for the naming contract.
    pub fn save_data(&self, path: &Path) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
        cache::save_data(self.model_data(), self.predictor_data(), path)
    }
}

/// Categorizes predictors regardless of an existing `PredictorCategory`
/// column. The constructor guards this with a presence check; calling it
/// directly recomputes and replaces.
pub fn apply_predictor_categorization(
    frame: LazyFrame,
    categorization: Categorization,
) -> LazyFrame {
    let rule = categorization.resolve();
    frame.categorize(rule, "PredictorName")
}

fn validate_model_data(
    df: Option<DataFrame>,
    query: Vec<QueryExpr>,
    extract_name_keys: bool,
) -> Result<(Option<LazyFrame>, Vec<String>)> {
    let Some(frame) = df else {
        info!("No model data available.");
        let candidates = CONTEXT_KEY_CANDIDATES.iter().map(|k| k.to_string()).collect();
        return Ok((None, candidates));
    };

    let frame = normalize_columns(frame);
    let context_keys = select_context_keys(&frame);

    if !frame.has_column("SnapshotTime") {
        return Err(DatamartError::missing_column(
            "SnapshotTime",
            "validating model data",
        ));
    }
    let needs_timestamp_parse = frame.column_type("SnapshotTime") != Some(&ColumnType::DateTime);

    let mut lazy = LazyFrame::new(frame);
    if extract_name_keys && lazy.source().has_column("Name") {
        lazy = lazy.extract_keys();
    }
    lazy = lazy.derive(derive::success_rate());
    if needs_timestamp_parse {
        lazy = lazy.parse_timestamp("SnapshotTime");
    }
    lazy = lazy.filter(query);

    Ok((Some(lazy), context_keys))
}

fn validate_predictor_data(
    df: Option<DataFrame>,
    categorization: Option<Categorization>,
) -> Result<Option<LazyFrame>> {
    let Some(frame) = df else {
        info!("No predictor data available.");
        return Ok(None);
    };

    let frame = normalize_columns(frame);
    let mut lazy = LazyFrame::new(frame);

    if !lazy.source().has_column("BinResponseCount") {
        lazy = lazy.derive(derive::bin_response_count());
    }
    lazy = lazy
        .derive(derive::bin_propensity())
        .derive(derive::bin_adjusted_propensity());

    if !lazy.source().has_column("PredictorCategory") {
        let rule = categorization
            .unwrap_or_else(|| Categorization::Rule(default_name_prefix()))
            .resolve();
        lazy = lazy.categorize(rule, "PredictorName");
    }

    if lazy.source().has_column("SnapshotTime")
        && lazy.source().column_type("SnapshotTime") != Some(&ColumnType::DateTime)
    {
        lazy = lazy.parse_timestamp("SnapshotTime");
    }

    Ok(Some(lazy))
}

/// Candidate list, `Treatment` appended iff present, then filtered to the
/// columns the (pre-extraction) model schema actually has.
fn select_context_keys(frame: &DataFrame) -> Vec<String> {
    let mut candidates: Vec<&str> = CONTEXT_KEY_CANDIDATES.to_vec();
    if frame.has_column("Treatment") {
        candidates.push("Treatment");
    }
    candidates
        .into_iter()
        .filter(|candidate| frame.has_column(candidate))
        .map(|candidate| candidate.to_string())
        .collect()
}
