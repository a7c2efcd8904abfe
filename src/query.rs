//! Query filtering over the normalized model dataset.
//!
//! Filters are boolean expressions (`ResponseCount > 100`,
//! `Channel == "Web" && Positives > 0`) evaluated row by row against a
//! context that binds every column under its canonical name. Null cells
//! bind as `Empty`. Validation is deferred: an expression referencing a
//! column the schema does not have only fails when the filter materializes.

use evalexpr::{
    ContextWithMutableVariables, EvalexprError, HashMapContext, Value as EvalValue,
    eval_with_context,
};

use crate::data::value_to_evalexpr;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;

/// A single filter predicate, kept as source text until materialization.
#[derive(Debug, Clone)]
pub struct QueryExpr {
    expression: String,
}

impl QueryExpr {
    pub fn new(expression: &str) -> Self {
        QueryExpr {
            expression: expression.trim().to_string(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Restricts `frame` to rows matching every filter. No filters is identity.
pub fn apply_filters(frame: &mut DataFrame, filters: &[QueryExpr]) -> Result<()> {
    if filters.is_empty() {
        return Ok(());
    }

    let mut kept = Vec::with_capacity(frame.row_count());
    for row in 0..frame.row_count() {
        let context = row_context(frame, row)?;
        let mut keep = true;
        for filter in filters {
            match eval_with_context(filter.expression(), &context) {
                Ok(value) => {
                    if !truthy(value) {
                        keep = false;
                        break;
                    }
                }
                Err(EvalexprError::VariableIdentifierNotFound(column)) => {
                    return Err(DatamartError::missing_column(
                        column,
                        format!("applying query '{}'", filter.expression()),
                    ));
                }
                Err(err) => {
                    return Err(DatamartError::Query {
                        expression: filter.expression().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        kept.push(keep);
    }

    let rows = std::mem::take(&mut frame.rows);
    frame.rows = rows
        .into_iter()
        .zip(kept)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();
    Ok(())
}

fn row_context(frame: &DataFrame, row: usize) -> Result<HashMapContext> {
    let mut context = HashMapContext::new();
    for (idx, column) in frame.columns.iter().enumerate() {
        let value = frame
            .cell(row, idx)
            .map(value_to_evalexpr)
            .unwrap_or(EvalValue::Empty);
        context
            .set_value(column.name.clone(), value)
            .map_err(|err| DatamartError::Query {
                expression: column.name.clone(),
                message: err.to_string(),
            })?;
    }
    Ok(context)
}

fn truthy(value: EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => b,
        EvalValue::Int(i) => i != 0,
        EvalValue::Float(f) => f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.into_iter().any(truthy),
        EvalValue::Empty => false,
    }
}
