use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("cannot open workbook {}: {message}", .path.display())]
    File { path: PathBuf, message: String },

    #[error("unsupported input {}: only .xlsx workbooks are accepted", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("sheet '{sheet}' could not be read: {message}")]
    Sheet { sheet: String, message: String },

    #[error("table '{label}' has {rows} rows and {columns} columns, more than a worksheet holds")]
    TableTooLarge { label: String, rows: usize, columns: usize },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build output workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}
