use polars::prelude::DataFrame;
use serde::Serialize;

/// One tab of the input workbook, materialized as a frame whose columns carry
/// the header text verbatim.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub frame: DataFrame,
}

impl Sheet {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self { name: name.into(), frame }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.get_column_names()
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }
}

/// Header of an output column. Most columns have a single level; composite
/// category keys stack one level per key part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnHeader {
    pub levels: Vec<String>,
}

impl ColumnHeader {
    pub fn single(label: impl Into<String>) -> Self {
        Self { levels: vec![label.into()] }
    }

    pub fn stacked(levels: Vec<String>) -> Self {
        Self { levels }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputCell {
    Text(String),
    Int(i64),
    Float(f64),
    Empty,
}

impl OutputCell {
    /// Undefined measures (NaN) are carried as empty cells, never as zero.
    pub fn from_measure(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => OutputCell::Float(v),
            _ => OutputCell::Empty,
        }
    }
}

/// A finalized table ready for the writer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OutputTable {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<OutputCell>>,
}

impl OutputTable {
    pub fn new(columns: Vec<ColumnHeader>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<OutputCell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn header_depth(&self) -> usize {
        self.columns.iter().map(ColumnHeader::depth).max().unwrap_or(0)
    }

    pub fn column_index(&self, levels: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.levels.iter().map(String::as_str).eq(levels.iter().copied()))
    }
}

/// A table together with the sheet label it is written under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub label: String,
    pub table: OutputTable,
}

impl NamedTable {
    pub fn new(label: impl Into<String>, table: OutputTable) -> Self {
        Self { label: label.into(), table }
    }
}
