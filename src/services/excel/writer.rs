use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};
use tempfile::NamedTempFile;

use super::types::{NamedTable, OutputCell};
use crate::services::summary::error::SummaryError;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Serializes tables into a new workbook, one sheet per table, in the order
/// given. The file at `path` is replaced atomically: it is either the complete
/// new workbook or left untouched.
pub fn write_workbook(path: &Path, tables: &[NamedTable]) -> Result<(), SummaryError> {
    tracing::info!("Writing {} sheet(s) to {}", tables.len(), path.display());

    let mut workbook = Workbook::new();
    for named in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&named.label)?;
        write_table(worksheet, named)?;
    }
    let buffer = workbook.save_to_buffer()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&buffer)?;
    tmp.as_file().sync_all()?;

    let (permissions, placeholder) = destination_permissions(path)?;
    let mode_set = tmp.as_file().set_permissions(permissions);
    let persisted = match mode_set {
        Ok(()) => tmp.persist(path).map(drop).map_err(|e| e.error),
        Err(e) => Err(e),
    };
    if let Err(e) = persisted {
        tracing::error!("Failed to persist {}: {}", path.display(), e);
        if placeholder {
            let _ = fs::remove_file(path);
        }
        return Err(SummaryError::Io(e));
    }

    tracing::info!("Saved {} ({} bytes)", path.display(), buffer.len());
    Ok(())
}

/// Mode for the output: that of the file being replaced, otherwise whatever a
/// plain create in the destination gets under the process umask. The second
/// value is true when an empty placeholder was created to learn it.
fn destination_permissions(path: &Path) -> io::Result<(Permissions, bool)> {
    match fs::metadata(path) {
        Ok(meta) => Ok((meta.permissions(), false)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let created = OpenOptions::new().write(true).create_new(true).open(path)?;
            Ok((created.metadata()?.permissions(), true))
        }
        Err(e) => Err(e),
    }
}

fn write_table(worksheet: &mut Worksheet, named: &NamedTable) -> Result<(), SummaryError> {
    let table = &named.table;
    let depth = table.header_depth();
    let total_rows = depth + table.rows.len();
    let too_large = || SummaryError::TableTooLarge {
        label: named.label.clone(),
        rows: total_rows,
        columns: table.columns.len(),
    };

    if total_rows > MAX_ROWS || table.columns.len() > MAX_COLUMNS {
        return Err(too_large());
    }

    for (col, header) in table.columns.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| too_large())?;
        for (level, label) in header.levels.iter().enumerate() {
            if !label.is_empty() {
                let level = u32::try_from(level).map_err(|_| too_large())?;
                worksheet.write_string(level, col, label)?;
            }
        }
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(depth + row_idx).map_err(|_| too_large())?;
        for (col, cell) in row.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| too_large())?;
            match cell {
                OutputCell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                OutputCell::Int(i) => {
                    worksheet.write_number(row_num, col, *i as f64)?;
                }
                OutputCell::Float(f) if f.is_finite() => {
                    worksheet.write_number(row_num, col, *f)?;
                }
                OutputCell::Float(_) | OutputCell::Empty => {}
            }
        }
    }

    Ok(())
}
