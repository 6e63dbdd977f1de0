use polars::prelude::{PolarsResult, Series};

use super::schema::{LENGTH_COLUMN, SURFACE_COLUMN, TREE_COLUMN, VOLUME_COLUMN};
use super::TAB_NAME_COLUMN;
use crate::services::excel::types::{ColumnHeader, NamedTable, OutputCell, OutputTable, Sheet};
use crate::services::excel::utils::{any_value_cell, any_value_number};

pub const TAB_SUMMARY_LABEL: &str = "Tab Summary";
pub const TREE_DETAILS_LABEL: &str = "Tree Details";

const MEASURE_COLUMNS: [&str; 3] = [LENGTH_COLUMN, SURFACE_COLUMN, VOLUME_COLUMN];

const SUMMARY_COLUMNS: [&str; 7] = [
    "Total Length (µm)",
    "Mean Length (µm)",
    "Total Surface (µm²)",
    "Mean Surface (µm²)",
    "Total Volume (µm³)",
    "Mean Volume (µm³)",
    "Number of Trees",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    pub tree: OutputCell,
    pub length: Option<f64>,
    pub surface: Option<f64>,
    pub volume: Option<f64>,
}

/// Sum and mean of one measure column. The mean is `None` when the column
/// has no numeric cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureStats {
    pub total: f64,
    pub mean: Option<f64>,
}

impl MeasureStats {
    fn of(values: impl Iterator<Item = Option<f64>>) -> Self {
        let (total, count) = values
            .flatten()
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        Self {
            total,
            mean: (count > 0).then(|| total / count as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetTotals {
    pub length: MeasureStats,
    pub surface: MeasureStats,
    pub volume: MeasureStats,
    pub tree_count: usize,
}

#[derive(Debug, Default)]
pub struct DendriteAggregate {
    by_tree: Vec<(String, Vec<TreeRecord>)>,
    totals: Vec<(String, SheetTotals)>,
}

impl DendriteAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_count(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn totals(&self, sheet: &str) -> Option<&SheetTotals> {
        self.totals.iter().find(|(name, _)| name == sheet).map(|(_, t)| t)
    }

    pub fn accumulate(&mut self, sheet: &Sheet) -> PolarsResult<()> {
        let trees = sheet.frame.column(TREE_COLUMN)?;
        let measures = MEASURE_COLUMNS
            .iter()
            .map(|col| sheet.frame.column(col))
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut records = Vec::with_capacity(sheet.row_count());
        for row_idx in 0..sheet.row_count() {
            records.push(TreeRecord {
                tree: any_value_cell(&trees.get(row_idx)?),
                length: numeric_at(measures[0], row_idx)?,
                surface: numeric_at(measures[1], row_idx)?,
                volume: numeric_at(measures[2], row_idx)?,
            });
        }

        let totals = SheetTotals {
            length: MeasureStats::of(records.iter().map(|r| r.length)),
            surface: MeasureStats::of(records.iter().map(|r| r.surface)),
            volume: MeasureStats::of(records.iter().map(|r| r.volume)),
            tree_count: records.len(),
        };

        tracing::info!(
            "Sheet {}: {} trees, total length {}",
            sheet.name,
            totals.tree_count,
            totals.length.total
        );
        if totals.tree_count == 0 {
            tracing::warn!("Sheet {} has no tree rows; means are undefined", sheet.name);
        }

        self.by_tree.push((sheet.name.clone(), records));
        self.totals.push((sheet.name.clone(), totals));
        Ok(())
    }

    /// Tab Summary first, then Tree Details.
    pub fn finalize(self) -> Vec<NamedTable> {
        vec![
            NamedTable::new(TAB_SUMMARY_LABEL, summary_table(&self.totals)),
            NamedTable::new(TREE_DETAILS_LABEL, details_table(&self.by_tree)),
        ]
    }
}

fn numeric_at(series: &Series, row_idx: usize) -> PolarsResult<Option<f64>> {
    Ok(any_value_number(&series.get(row_idx)?))
}

fn summary_table(totals: &[(String, SheetTotals)]) -> OutputTable {
    let mut columns = vec![ColumnHeader::single(TAB_NAME_COLUMN)];
    columns.extend(SUMMARY_COLUMNS.iter().map(|c| ColumnHeader::single(*c)));

    let mut table = OutputTable::new(columns);
    for (name, t) in totals {
        table.push_row(vec![
            OutputCell::Text(name.clone()),
            OutputCell::Float(t.length.total),
            OutputCell::from_measure(t.length.mean),
            OutputCell::Float(t.surface.total),
            OutputCell::from_measure(t.surface.mean),
            OutputCell::Float(t.volume.total),
            OutputCell::from_measure(t.volume.mean),
            OutputCell::Int(t.tree_count as i64),
        ]);
    }
    table
}

fn details_table(by_tree: &[(String, Vec<TreeRecord>)]) -> OutputTable {
    let mut columns = vec![
        ColumnHeader::single(TAB_NAME_COLUMN),
        ColumnHeader::single(TREE_COLUMN),
    ];
    columns.extend(MEASURE_COLUMNS.iter().map(|c| ColumnHeader::single(*c)));

    let mut table = OutputTable::new(columns);
    for (name, records) in by_tree {
        for record in records {
            table.push_row(vec![
                OutputCell::Text(name.clone()),
                record.tree.clone(),
                OutputCell::from_measure(record.length),
                OutputCell::from_measure(record.surface),
                OutputCell::from_measure(record.volume),
            ]);
        }
    }
    table
}
