use crate::data::Value;
use crate::schema::{ColumnMeta, ColumnType};

/// An in-memory tabular dataset: ordered column metadata plus typed rows.
/// Cells are `None` when the source field was empty or the column was
/// appended after the row existed.
#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl DataFrame {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        DataFrame {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.column_index(name).map(|idx| &self.columns[idx].data_type)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Option<Value>>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Appends a column with one value per existing row.
    pub fn push_column(&mut self, meta: ColumnMeta, values: Vec<Option<Value>>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(meta);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|v| v.as_ref())
    }
}
