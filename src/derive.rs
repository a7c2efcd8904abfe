//! Derived-metric expressions.
//!
//! Metrics are described as small arithmetic trees and evaluated row by row
//! when a pipeline materializes, so a missing input column only surfaces at
//! collect time. Null cells propagate null. Division follows IEEE float
//! semantics (`0/0` is NaN, `x/0` is infinite); only an explicit
//! [`MetricExpr::FillNan`] wrapper rewrites NaN.

use crate::data::Value;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;
use crate::schema::{ColumnMeta, ColumnType};

#[derive(Debug, Clone)]
pub enum MetricExpr {
    Col(String),
    Lit(f64),
    Add(Box<MetricExpr>, Box<MetricExpr>),
    Div(Box<MetricExpr>, Box<MetricExpr>),
    FillNan(Box<MetricExpr>, f64),
}

impl MetricExpr {
    pub fn col(name: &str) -> Self {
        MetricExpr::Col(name.to_string())
    }

    pub fn lit(value: f64) -> Self {
        MetricExpr::Lit(value)
    }

    pub fn add(self, rhs: MetricExpr) -> Self {
        MetricExpr::Add(Box::new(self), Box::new(rhs))
    }

    pub fn div(self, rhs: MetricExpr) -> Self {
        MetricExpr::Div(Box::new(self), Box::new(rhs))
    }

    pub fn fill_nan(self, fill: f64) -> Self {
        MetricExpr::FillNan(Box::new(self), fill)
    }

    fn evaluate(&self, frame: &DataFrame, row: usize, metric: &str) -> Result<Option<f64>> {
        match self {
            MetricExpr::Col(name) => {
                let idx = frame.column_index(name).ok_or_else(|| {
                    DatamartError::missing_column(name, format!("deriving '{metric}'"))
                })?;
                match frame.cell(row, idx) {
                    None => Ok(None),
                    Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                        DatamartError::missing_column(
                            name,
                            format!("reading numeric values for '{metric}'"),
                        )
                    }),
                }
            }
            MetricExpr::Lit(value) => Ok(Some(*value)),
            MetricExpr::Add(lhs, rhs) => {
                Ok(match (
                    lhs.evaluate(frame, row, metric)?,
                    rhs.evaluate(frame, row, metric)?,
                ) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                })
            }
            MetricExpr::Div(lhs, rhs) => {
                Ok(match (
                    lhs.evaluate(frame, row, metric)?,
                    rhs.evaluate(frame, row, metric)?,
                ) {
                    (Some(a), Some(b)) => Some(a / b),
                    _ => None,
                })
            }
            MetricExpr::FillNan(inner, fill) => Ok(inner
                .evaluate(frame, row, metric)?
                .map(|v| if v.is_nan() { *fill } else { v })),
        }
    }
}

/// A named derived column. Applying it overwrites an existing column of the
/// same name, matching replace-on-conflict column semantics.
#[derive(Debug, Clone)]
pub struct DerivedMetric {
    pub name: String,
    pub expr: MetricExpr,
}

impl DerivedMetric {
    pub fn new(name: &str, expr: MetricExpr) -> Self {
        DerivedMetric {
            name: name.to_string(),
            expr,
        }
    }

    pub fn apply(&self, frame: &mut DataFrame) -> Result<()> {
        let mut values = Vec::with_capacity(frame.row_count());
        for row in 0..frame.row_count() {
            let value = self.expr.evaluate(frame, row, &self.name)?;
            values.push(value.map(Value::Float));
        }
        match frame.column_index(&self.name) {
            Some(idx) => {
                frame.columns[idx].data_type = ColumnType::Float;
                for (row, value) in frame.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => frame.push_column(
                ColumnMeta {
                    name: self.name.clone(),
                    data_type: ColumnType::Float,
                },
                values,
            ),
        }
        Ok(())
    }
}

/// `SuccessRate = Positives / ResponseCount`, NaN (including 0/0) as 0.
pub fn success_rate() -> DerivedMetric {
    DerivedMetric::new(
        "SuccessRate",
        MetricExpr::col("Positives")
            .div(MetricExpr::col("ResponseCount"))
            .fill_nan(0.0),
    )
}

/// `BinResponseCount = BinPositives + BinNegatives`, derived only when the
/// export did not carry the column.
pub fn bin_response_count() -> DerivedMetric {
    DerivedMetric::new(
        "BinResponseCount",
        MetricExpr::col("BinPositives").add(MetricExpr::col("BinNegatives")),
    )
}

/// `BinPropensity = BinPositives / BinResponseCount`. Unguarded: a zero
/// response count propagates NaN or infinity.
pub fn bin_propensity() -> DerivedMetric {
    DerivedMetric::new(
        "BinPropensity",
        MetricExpr::col("BinPositives").div(MetricExpr::col("BinResponseCount")),
    )
}

/// Laplace-smoothed propensity, well-defined for any non-negative counts.
pub fn bin_adjusted_propensity() -> DerivedMetric {
    DerivedMetric::new(
        "BinAdjustedPropensity",
        MetricExpr::col("BinPositives")
            .add(MetricExpr::lit(0.5))
            .div(MetricExpr::col("BinResponseCount").add(MetricExpr::lit(1.0))),
    )
}
