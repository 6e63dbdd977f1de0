use std::collections::HashMap;

use polars::prelude::PolarsResult;

use super::schema::MarkerVariant;
use super::TAB_NAME_COLUMN;
use crate::services::excel::types::{ColumnHeader, OutputCell, OutputTable, Sheet};
use crate::services::excel::utils::{any_value_label, any_value_number};

pub const MARKER_SHEET_LABEL: &str = "Marker Summary";

/// Grouping identity for marker quantities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    Single(String),
    Composite(String, String),
}

impl CategoryKey {
    fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        match parts.len() {
            1 => parts.pop().map(CategoryKey::Single),
            2 => {
                let name = parts.pop()?;
                let kind = parts.pop()?;
                Some(CategoryKey::Composite(kind, name))
            }
            _ => None,
        }
    }

    fn header(&self) -> ColumnHeader {
        match self {
            CategoryKey::Single(label) => ColumnHeader::single(label.clone()),
            CategoryKey::Composite(kind, name) => ColumnHeader::stacked(vec![kind.clone(), name.clone()]),
        }
    }
}

#[derive(Debug)]
struct SheetTotals {
    name: String,
    totals: HashMap<usize, f64>,
}

/// Running sheet × key totals. Keys are remembered in first-seen order so the
/// finalized table is deterministic for a given workbook.
#[derive(Debug, Default)]
pub struct MarkerCountAggregate {
    keys: Vec<CategoryKey>,
    key_index: HashMap<CategoryKey, usize>,
    sheets: Vec<SheetTotals>,
}

impl MarkerCountAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    #[cfg(test)]
    pub fn keys(&self) -> &[CategoryKey] {
        &self.keys
    }

    /// Groups the sheet's rows by the variant's key columns and sums the
    /// quantity column per key. Rows with a blank key part are ignored.
    pub fn accumulate(&mut self, sheet: &Sheet, variant: &MarkerVariant) -> PolarsResult<()> {
        let key_series = variant
            .key_columns
            .iter()
            .map(|col| sheet.frame.column(col))
            .collect::<PolarsResult<Vec<_>>>()?;
        let quantities = sheet.frame.column(variant.quantity_column)?;

        let mut totals: HashMap<usize, f64> = HashMap::new();
        let mut skipped = 0usize;

        for row_idx in 0..sheet.row_count() {
            let mut parts = Vec::with_capacity(key_series.len());
            for series in &key_series {
                match any_value_label(&series.get(row_idx)?) {
                    Some(label) => parts.push(label),
                    None => break,
                }
            }
            let Some(key) = (parts.len() == key_series.len())
                .then(|| CategoryKey::from_parts(parts))
                .flatten()
            else {
                skipped += 1;
                continue;
            };

            let idx = self.intern(key);
            let entry = totals.entry(idx).or_insert(0.0);
            if let Some(qty) = any_value_number(&quantities.get(row_idx)?) {
                *entry += qty;
            }
        }

        if skipped > 0 {
            tracing::debug!("Sheet {}: ignored {} rows with a blank key", sheet.name, skipped);
        }
        tracing::info!(
            "Sheet {}: {} marker categories ({} layout)",
            sheet.name,
            totals.len(),
            variant.name
        );

        self.sheets.push(SheetTotals {
            name: sheet.name.clone(),
            totals,
        });
        Ok(())
    }

    /// Quantity for one sheet and key as it will appear in the output.
    pub fn quantity(&self, sheet: &str, key: &CategoryKey) -> Option<i64> {
        let idx = *self.key_index.get(key)?;
        let totals = self.sheets.iter().find(|s| s.name == sheet)?;
        Some(totals.totals.get(&idx).copied().map_or(0, to_count))
    }

    /// One row per sheet, one column per key, led by the sheet name. Absent
    /// sheet/key combinations are 0.
    pub fn finalize(self) -> OutputTable {
        let mut columns = Vec::with_capacity(self.keys.len() + 1);
        columns.push(ColumnHeader::single(TAB_NAME_COLUMN));
        columns.extend(self.keys.iter().map(CategoryKey::header));

        let mut table = OutputTable::new(columns);
        for sheet in &self.sheets {
            let mut row = Vec::with_capacity(self.keys.len() + 1);
            row.push(OutputCell::Text(sheet.name.clone()));
            row.extend((0..self.keys.len()).map(|idx| {
                OutputCell::Int(sheet.totals.get(&idx).copied().map_or(0, to_count))
            }));
            table.push_row(row);
        }
        table
    }

    fn intern(&mut self, key: CategoryKey) -> usize {
        if let Some(&idx) = self.key_index.get(&key) {
            return idx;
        }
        let idx = self.keys.len();
        self.keys.push(key.clone());
        self.key_index.insert(key, idx);
        idx
    }
}

fn to_count(total: f64) -> i64 {
    total.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::summary::schema::MARKER_VARIANTS;
    use polars::prelude::*;

    fn marker_sheet(name: &str, rows: &[(&str, &str, f64)]) -> Sheet {
        let types: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let names: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let qty: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let df = DataFrame::new(vec![
            Series::new("Type", types),
            Series::new("Name", names),
            Series::new("Qty of Markers", qty),
        ])
        .unwrap();
        Sheet::new(name, df)
    }

    fn composite(kind: &str, name: &str) -> CategoryKey {
        CategoryKey::Composite(kind.into(), name.into())
    }

    #[test]
    fn duplicate_keys_are_summed() {
        let sheet = marker_sheet("S1", &[("Spine", "A", 3.0), ("Spine", "A", 5.0), ("Spine", "B", 1.0)]);
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&sheet, &MARKER_VARIANTS[0]).unwrap();
        assert_eq!(agg.quantity("S1", &composite("Spine", "A")), Some(8));
        assert_eq!(agg.quantity("S1", &composite("Spine", "B")), Some(1));
    }

    #[test]
    fn missing_combinations_are_zero() {
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&marker_sheet("S1", &[("A", "x", 3.0)]), &MARKER_VARIANTS[0]).unwrap();
        agg.accumulate(&marker_sheet("S2", &[("A", "y", 2.0)]), &MARKER_VARIANTS[0]).unwrap();

        let table = agg.finalize();
        assert_eq!(table.rows.len(), 2);
        let x = table.column_index(&["A", "x"]).unwrap();
        let y = table.column_index(&["A", "y"]).unwrap();
        assert_eq!(table.rows[0][x], OutputCell::Int(3));
        assert_eq!(table.rows[0][y], OutputCell::Int(0));
        assert_eq!(table.rows[1][x], OutputCell::Int(0));
        assert_eq!(table.rows[1][y], OutputCell::Int(2));
    }

    #[test]
    fn finalized_table_leads_with_tab_name() {
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&marker_sheet("Neuron 1", &[("A", "x", 3.0)]), &MARKER_VARIANTS[0]).unwrap();
        let table = agg.finalize();
        assert_eq!(table.columns[0], ColumnHeader::single("Tab Name"));
        assert_eq!(table.rows[0][0], OutputCell::Text("Neuron 1".into()));
        assert_eq!(table.header_depth(), 2);
    }

    #[test]
    fn single_key_layout_groups_by_name() {
        let df = DataFrame::new(vec![
            Series::new("Name", &["Soma", "Spine", "Soma"]),
            Series::new("Qty of Markers", &[2i64, 4, 1]),
        ])
        .unwrap();
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&Sheet::new("S", df), &MARKER_VARIANTS[1]).unwrap();
        assert_eq!(agg.quantity("S", &CategoryKey::Single("Soma".into())), Some(3));
        assert_eq!(agg.keys().len(), 2);
    }

    #[test]
    fn blank_keys_and_quantities_contribute_nothing() {
        let df = DataFrame::new(vec![
            Series::new("Type", &[Some("Dot"), None, Some("Dot")]),
            Series::new("Count", &[Some(2.0f64), Some(9.0), None]),
        ])
        .unwrap();
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&Sheet::new("S", df), &MARKER_VARIANTS[2]).unwrap();
        assert_eq!(agg.keys(), &[CategoryKey::Single("Dot".into())]);
        assert_eq!(agg.quantity("S", &CategoryKey::Single("Dot".into())), Some(2));
    }

    #[test]
    fn header_only_sheet_still_gets_a_row() {
        let mut agg = MarkerCountAggregate::new();
        agg.accumulate(&marker_sheet("S1", &[("A", "x", 1.0)]), &MARKER_VARIANTS[0]).unwrap();
        agg.accumulate(&marker_sheet("Empty", &[]), &MARKER_VARIANTS[0]).unwrap();
        let table = agg.finalize();
        assert_eq!(table.rows[1], vec![OutputCell::Text("Empty".into()), OutputCell::Int(0)]);
    }

    #[test]
    fn empty_aggregate_finalizes_to_header_only_table() {
        let table = MarkerCountAggregate::new().finalize();
        assert_eq!(table.columns, vec![ColumnHeader::single("Tab Name")]);
        assert!(table.rows.is_empty());
    }
}
