use std::collections::HashSet;
use std::path::{Path, PathBuf};

use calamine::Data;
use polars::prelude::AnyValue;

use super::types::OutputCell;

pub const OUTPUT_SUFFIX: &str = "_Summary_Output";
pub const INPUT_EXTENSION: &str = "xlsx";

/// Header text is kept verbatim. Blank headers and repeats are renamed the
/// way spreadsheet readers conventionally do (`Unnamed: 3`, `Qty.1`).
pub fn unique_column_name(raw: &str, index: usize, existing_names: &mut HashSet<String>) -> String {
    let base = if raw.trim().is_empty() {
        format!("Unnamed: {}", index)
    } else {
        raw.to_string()
    };

    let mut name = base.clone();
    let mut counter = 1;
    while !existing_names.insert(name.clone()) {
        name = format!("{}.{}", base, counter);
        counter += 1;
    }

    name
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Text,
}

/// A column is numeric only when every non-empty cell is a number.
pub fn detect_column_kind(values: &[Data]) -> ColumnKind {
    let mut ints = 0;
    let mut floats = 0;
    let mut total = 0;

    for value in values.iter().filter(|v| !matches!(v, Data::Empty)) {
        total += 1;
        match value {
            Data::Int(_) => ints += 1,
            Data::Float(_) => floats += 1,
            _ => return ColumnKind::Text,
        }
    }

    match () {
        _ if total == 0 => ColumnKind::Text,
        _ if ints == total => ColumnKind::Int,
        _ if ints + floats == total => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn data_to_text(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::Float(f) => Some(format_number(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Renders a frame value as a grouping label; nulls have no label.
pub fn any_value_label(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::Float64(f) => Some(format_number(*f)),
        AnyValue::Float32(f) => Some(format_number(*f as f64)),
        AnyValue::Int64(i) => Some(i.to_string()),
        AnyValue::Int32(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric reading of a frame value; numeric text is parsed, anything else
/// counts as missing.
pub fn any_value_number(value: &AnyValue) -> Option<f64> {
    match value {
        AnyValue::Float64(f) if !f.is_nan() => Some(*f),
        AnyValue::Float32(f) if !f.is_nan() => Some(*f as f64),
        AnyValue::Int64(i) => Some(*i as f64),
        AnyValue::Int32(i) => Some(*i as f64),
        AnyValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        _ => None,
    }
}

pub fn any_value_cell(value: &AnyValue) -> OutputCell {
    match value {
        AnyValue::Null => OutputCell::Empty,
        AnyValue::Int64(i) => OutputCell::Int(*i),
        AnyValue::Int32(i) => OutputCell::Int(*i as i64),
        AnyValue::Float64(f) => OutputCell::from_measure(Some(*f)),
        AnyValue::Float32(f) => OutputCell::from_measure(Some(*f as f64)),
        other => any_value_label(other).map_or(OutputCell::Empty, OutputCell::Text),
    }
}

pub fn has_workbook_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
}

/// `<dir>/<stem>_Summary_Output.<ext>` next to the input file.
pub fn derive_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };

    input.with_file_name(file_name)
}
