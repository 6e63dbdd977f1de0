use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use polars::prelude::*;

use super::types::Sheet;
use super::utils::*;
use crate::services::summary::error::SummaryError;

/// Read-only handle on an input workbook. The underlying file is owned by the
/// handle and closed when it is dropped.
pub struct WorkbookReader {
    workbook: Xlsx<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl WorkbookReader {
    pub fn open(path: &Path) -> Result<Self, SummaryError> {
        if !has_workbook_extension(path) {
            return Err(SummaryError::UnsupportedFormat(path.to_path_buf()));
        }

        tracing::info!("Opening workbook {}", path.display());
        let workbook: Xlsx<_> = open_workbook(path).map_err(|e: calamine::XlsxError| {
            tracing::error!("Failed to open workbook {}: {}", path.display(), e);
            SummaryError::File {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        let sheet_names = workbook.sheet_names().to_vec();
        tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

        Ok(Self {
            workbook,
            sheet_names,
        })
    }

    /// Sheet names in the order they appear in the file.
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn read_sheet(&mut self, name: &str) -> Result<Sheet, SummaryError> {
        let range = self.workbook.worksheet_range(name).map_err(|e| {
            tracing::warn!("Failed to read worksheet {}: {}", name, e);
            SummaryError::Sheet {
                sheet: name.to_string(),
                message: e.to_string(),
            }
        })?;

        let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
        tracing::debug!("Sheet {} has {} rows including header", name, rows.len());

        let frame = create_dataframe(&rows).map_err(|e| SummaryError::Sheet {
            sheet: name.to_string(),
            message: e.to_string(),
        })?;

        Ok(Sheet::new(name, frame))
    }
}

/// First row is the header; every later row is data. An empty range yields a
/// frame with no columns.
pub fn create_dataframe(rows: &[Vec<Data>]) -> PolarsResult<DataFrame> {
    let Some(header_row) = rows.first() else {
        return Ok(DataFrame::empty());
    };

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut existing_names = HashSet::new();
    let mut columns = Vec::with_capacity(width);

    for col_idx in 0..width {
        let raw = header_row
            .get(col_idx)
            .and_then(data_to_text)
            .unwrap_or_default();
        let header = unique_column_name(&raw, col_idx, &mut existing_names);

        let values: Vec<Data> = rows
            .iter()
            .skip(1)
            .map(|row| row.get(col_idx).cloned().unwrap_or(Data::Empty))
            .collect();

        let series = match detect_column_kind(&values) {
            ColumnKind::Int => {
                let ints: Vec<Option<i64>> = values
                    .iter()
                    .map(|v| match v {
                        Data::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                Series::new(&header, ints)
            }
            ColumnKind::Float => {
                let nums: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| match v {
                        Data::Float(f) => Some(*f),
                        Data::Int(i) => Some(*i as f64),
                        _ => None,
                    })
                    .collect();
                Series::new(&header, nums)
            }
            ColumnKind::Text => {
                let strings: Vec<Option<String>> = values.iter().map(data_to_text).collect();
                Series::new(&header, strings)
            }
        };

        columns.push(series);
    }

    DataFrame::new(columns)
}
