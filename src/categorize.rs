//! Predictor categorization.
//!
//! Each predictor gets a `PredictorCategory` label derived from its name by
//! a caller-supplied rule. The operation itself recomputes unconditionally
//! (replacing any same-named column); the datamart pipeline guards it with
//! a presence check so hand-labelled exports keep their categories.

use std::fmt;
use std::sync::Arc;

use crate::data::Value;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;
use crate::schema::{ColumnMeta, ColumnType};

/// A named classification rule mapping a predictor name to a category.
#[derive(Clone)]
pub struct CategoryRule {
    label: String,
    classify: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl CategoryRule {
    pub fn new(
        label: &str,
        classify: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        CategoryRule {
            label: label.to_string(),
            classify: Arc::new(classify),
        }
    }

    pub fn classify(&self, predictor_name: &str) -> String {
        (self.classify)(predictor_name)
    }
}

impl fmt::Debug for CategoryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryRule")
            .field("label", &self.label)
            .finish()
    }
}

/// Either a ready-made rule or a zero-argument factory producing one.
/// Factories are invoked exactly once, when the rule is first needed.
#[derive(Debug, Clone)]
pub enum Categorization {
    Rule(CategoryRule),
    Factory(fn() -> CategoryRule),
}

impl Categorization {
    pub fn resolve(self) -> CategoryRule {
        match self {
            Categorization::Rule(rule) => rule,
            Categorization::Factory(factory) => factory(),
        }
    }
}

/// Default rule: a dotted predictor name categorizes as its first segment
/// (`Customer.Age` -> `Customer`), anything else as `Primary`.
pub fn default_name_prefix() -> CategoryRule {
    CategoryRule::new("name-prefix", |name| {
        let mut segments = name.split('.');
        match (segments.next(), segments.next()) {
            (Some(prefix), Some(_)) => prefix.to_string(),
            _ => "Primary".to_string(),
        }
    })
}

/// Computes a category for every row from `source` and writes it to
/// `PredictorCategory`, replacing the column if it already exists.
pub fn apply_categorization(
    frame: &mut DataFrame,
    rule: &CategoryRule,
    source: &str,
) -> Result<()> {
    let source_idx = frame.column_index(source).ok_or_else(|| {
        DatamartError::missing_column(source, "assigning predictor categories")
    })?;

    let values: Vec<Option<Value>> = frame
        .rows
        .iter()
        .map(|row| {
            row.get(source_idx)
                .and_then(|v| v.as_ref())
                .map(|v| Value::String(rule.classify(&v.as_display())))
        })
        .collect();

    match frame.column_index("PredictorCategory") {
        Some(idx) => {
            frame.columns[idx].data_type = ColumnType::String;
            for (row, value) in frame.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
        }
        None => frame.push_column(
            ColumnMeta {
                name: "PredictorCategory".to_string(),
                data_type: ColumnType::String,
            },
            values,
        ),
    }
    Ok(())
}
