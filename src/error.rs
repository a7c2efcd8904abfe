//! Error taxonomy for datamart construction and persistence.
//!
//! Absence of an input dataset is deliberately *not* represented here: a
//! missing export propagates as `Option::None` plus an info log so that
//! downstream accessors degrade gracefully instead of raising.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatamartError {
    /// A required column is missing at the point a dependent operation runs.
    #[error("column '{column}' not found while {operation}")]
    Schema { column: String, operation: String },

    /// A snapshot-time value matched none of the accepted temporal formats.
    #[error("failed to parse '{value}' as a snapshot timestamp")]
    Parse { value: String },

    /// A query expression could not be compiled or evaluated.
    #[error("query expression '{expression}' failed: {message}")]
    Query { expression: String, message: String },

    /// A cache artifact could not be written. Reported per artifact; a
    /// sibling write that already completed stays on disk.
    #[error("failed to write artifact {artifact:?}")]
    Storage {
        artifact: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DatamartError {
    pub fn missing_column(column: impl Into<String>, operation: impl Into<String>) -> Self {
        DatamartError::Schema {
            column: column.into(),
            operation: operation.into(),
        }
    }
}

pub type Result<T, E = DatamartError> = std::result::Result<T, E>;
