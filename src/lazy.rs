//! Deferred pipelines over [`DataFrame`]s.
//!
//! A [`LazyFrame`] is a source dataset plus an ordered list of operations.
//! Nothing runs until [`LazyFrame::collect`] materializes the pipeline, so
//! a malformed operation (a derive or filter referencing a missing column,
//! an unparseable timestamp) surfaces at collect time, not while the
//! pipeline is being described. Each datamart owns its own pipelines; there
//! is no shared state between instances.

use std::collections::HashMap;

use crate::categorize::{CategoryRule, apply_categorization};
use crate::data::{Value, parse_snapshot_time};
use crate::derive::DerivedMetric;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;
use crate::keys::extract_name_keys;
use crate::query::{QueryExpr, apply_filters};
use crate::schema::ColumnType;

const KEY_SEPARATOR: &str = "\u{1f}";

#[derive(Debug, Clone)]
pub enum Op {
    /// Decode JSON-object `Name` cells into appended key columns.
    ExtractKeys,
    /// Compute or replace a derived numeric column.
    Derive(DerivedMetric),
    /// Reinterpret a column as a timestamp unless already temporal.
    ParseTimestamp { column: String },
    /// Assign predictor categories from a name-classification rule.
    Categorize { rule: CategoryRule, source: String },
    /// Restrict rows to those matching every query expression.
    Filter(Vec<QueryExpr>),
    /// Inner-join another pipeline's output onto this one.
    Join {
        right: Box<LazyFrame>,
        on: Vec<String>,
        suffix: String,
    },
}

#[derive(Debug, Clone)]
pub struct LazyFrame {
    source: DataFrame,
    ops: Vec<Op>,
}

impl LazyFrame {
    pub fn new(source: DataFrame) -> Self {
        LazyFrame {
            source,
            ops: Vec::new(),
        }
    }

    /// The dataset the pipeline starts from. Ops may add columns the source
    /// does not show yet.
    pub fn source(&self) -> &DataFrame {
        &self.source
    }

    pub fn extract_keys(mut self) -> Self {
        self.ops.push(Op::ExtractKeys);
        self
    }

    pub fn derive(mut self, metric: DerivedMetric) -> Self {
        self.ops.push(Op::Derive(metric));
        self
    }

    pub fn parse_timestamp(mut self, column: &str) -> Self {
        self.ops.push(Op::ParseTimestamp {
            column: column.to_string(),
        });
        self
    }

    pub fn categorize(mut self, rule: CategoryRule, source: &str) -> Self {
        self.ops.push(Op::Categorize {
            rule,
            source: source.to_string(),
        });
        self
    }

    pub fn filter(mut self, filters: Vec<QueryExpr>) -> Self {
        if !filters.is_empty() {
            self.ops.push(Op::Filter(filters));
        }
        self
    }

    /// Describes an inner join of `right` onto this pipeline. Both sides
    /// stay lazy; the right side is collected when this pipeline is.
    pub fn join(&self, right: &LazyFrame, on: Vec<String>, suffix: &str) -> LazyFrame {
        let mut joined = self.clone();
        joined.ops.push(Op::Join {
            right: Box::new(right.clone()),
            on,
            suffix: suffix.to_string(),
        });
        joined
    }

    /// Executes the pipeline. The only place deferred schema, parse, and
    /// query errors can surface.
    pub fn collect(&self) -> Result<DataFrame> {
        let mut frame = self.source.clone();
        for op in &self.ops {
            apply_op(&mut frame, op)?;
        }
        Ok(frame)
    }
}

fn apply_op(frame: &mut DataFrame, op: &Op) -> Result<()> {
    match op {
        Op::ExtractKeys => {
            extract_name_keys(frame);
            Ok(())
        }
        Op::Derive(metric) => metric.apply(frame),
        Op::ParseTimestamp { column } => parse_timestamp(frame, column),
        Op::Categorize { rule, source } => apply_categorization(frame, rule, source),
        Op::Filter(filters) => apply_filters(frame, filters),
        Op::Join { right, on, suffix } => {
            let right_frame = right.collect()?;
            *frame = inner_join(frame, &right_frame, on, suffix)?;
            Ok(())
        }
    }
}

fn parse_timestamp(frame: &mut DataFrame, column: &str) -> Result<()> {
    let idx = frame
        .column_index(column)
        .ok_or_else(|| DatamartError::missing_column(column, "parsing snapshot timestamps"))?;
    if frame.columns[idx].data_type == ColumnType::DateTime {
        return Ok(());
    }
    for row in &mut frame.rows {
        if let Some(value) = &row[idx] {
            let raw = value.as_display();
            let parsed =
                parse_snapshot_time(&raw).map_err(|_| DatamartError::Parse { value: raw })?;
            row[idx] = Some(Value::DateTime(parsed));
        }
    }
    frame.columns[idx].data_type = ColumnType::DateTime;
    Ok(())
}

/// Inner join: left rows are kept once per matching right row, in left
/// order; left rows without a match drop out. Right-side key columns are
/// not repeated; other right columns colliding with a left name get
/// `suffix` appended.
fn inner_join(
    left: &DataFrame,
    right: &DataFrame,
    on: &[String],
    suffix: &str,
) -> Result<DataFrame> {
    let left_keys = key_indices(left, on, "joining on the left side")?;
    let right_keys = key_indices(right, on, "joining on the right side")?;

    let mut lookup: HashMap<String, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows.iter().enumerate() {
        lookup
            .entry(join_key(row, &right_keys))
            .or_default()
            .push(row_idx);
    }

    let mut columns = left.columns.clone();
    let mut carried: Vec<usize> = Vec::new();
    for (idx, column) in right.columns.iter().enumerate() {
        if right_keys.contains(&idx) {
            continue;
        }
        let mut candidate = column.name.clone();
        if left.has_column(&candidate) {
            candidate.push_str(suffix);
            let mut counter = 1usize;
            let base = candidate.clone();
            while columns.iter().any(|c| c.name == candidate) {
                candidate = format!("{base}{counter}");
                counter += 1;
            }
        }
        let mut meta = column.clone();
        meta.name = candidate;
        columns.push(meta);
        carried.push(idx);
    }

    let mut joined = DataFrame::new(columns);
    for row in &left.rows {
        let key = join_key(row, &left_keys);
        if let Some(matches) = lookup.get(&key) {
            for right_idx in matches {
                let mut combined = row.clone();
                combined.extend(
                    carried
                        .iter()
                        .map(|idx| right.rows[*right_idx][*idx].clone()),
                );
                joined.push_row(combined);
            }
        }
    }
    Ok(joined)
}

fn key_indices(frame: &DataFrame, on: &[String], operation: &str) -> Result<Vec<usize>> {
    on.iter()
        .map(|name| {
            frame
                .column_index(name)
                .ok_or_else(|| DatamartError::missing_column(name, operation))
        })
        .collect()
}

fn join_key(row: &[Option<Value>], key_indices: &[usize]) -> String {
    let mut parts = Vec::with_capacity(key_indices.len());
    for idx in key_indices {
        match row.get(*idx).and_then(|v| v.as_ref()) {
            Some(value) => parts.push(value.as_display()),
            None => parts.push(String::new()),
        }
    }
    parts.join(KEY_SEPARATOR)
}
