use std::collections::HashSet;

use crate::services::excel::types::Sheet;

pub const TYPE_COLUMN: &str = "Type";
pub const NAME_COLUMN: &str = "Name";
pub const QTY_OF_MARKERS_COLUMN: &str = "Qty of Markers";
pub const COUNT_COLUMN: &str = "Count";

pub const TREE_COLUMN: &str = "Tree";
pub const LENGTH_COLUMN: &str = "Length Total(µm)";
pub const SURFACE_COLUMN: &str = "Surface Total(µm²)";
pub const VOLUME_COLUMN: &str = "Volume Total(µm³)";

pub const DENDRITE_COLUMNS: [&str; 4] = [TREE_COLUMN, LENGTH_COLUMN, SURFACE_COLUMN, VOLUME_COLUMN];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Missing(Vec<String>),
}

/// Subset test on column names: exact, case-sensitive, order-independent.
/// Missing columns are reported in the order they were required.
pub fn validate(sheet: &Sheet, required: &[&str]) -> Validation {
    let present: HashSet<&str> = sheet.column_names().into_iter().collect();
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !present.contains(*col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Validation::Ok
    } else {
        Validation::Missing(missing)
    }
}

/// One accepted marker-count layout: which columns form the category key and
/// which column carries the quantity to sum.
#[derive(Debug, PartialEq, Eq)]
pub struct MarkerVariant {
    pub name: &'static str,
    pub key_columns: &'static [&'static str],
    pub quantity_column: &'static str,
}

impl MarkerVariant {
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut cols = self.key_columns.to_vec();
        cols.push(self.quantity_column);
        cols
    }
}

/// Declared precedence; the first variant a sheet satisfies wins.
pub const MARKER_VARIANTS: [MarkerVariant; 3] = [
    MarkerVariant {
        name: "type-name",
        key_columns: &[TYPE_COLUMN, NAME_COLUMN],
        quantity_column: QTY_OF_MARKERS_COLUMN,
    },
    MarkerVariant {
        name: "name",
        key_columns: &[NAME_COLUMN],
        quantity_column: QTY_OF_MARKERS_COLUMN,
    },
    MarkerVariant {
        name: "type-count",
        key_columns: &[TYPE_COLUMN],
        quantity_column: COUNT_COLUMN,
    },
];

/// Picks the first matching variant. When none match, the missing columns of
/// the closest variant are returned (fewest missing, earliest on ties).
pub fn select_marker_variant(sheet: &Sheet) -> Result<&'static MarkerVariant, Vec<String>> {
    let mut closest: Option<Vec<String>> = None;

    for variant in MARKER_VARIANTS.iter() {
        match validate(sheet, &variant.required_columns()) {
            Validation::Ok => return Ok(variant),
            Validation::Missing(missing) => {
                if closest.as_ref().map_or(true, |best| missing.len() < best.len()) {
                    closest = Some(missing);
                }
            }
        }
    }

    Err(closest.unwrap_or_default())
}
