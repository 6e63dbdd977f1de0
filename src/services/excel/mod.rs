pub mod reader;
pub mod types;
pub mod utils;
pub mod writer;

pub use reader::WorkbookReader;
pub use writer::write_workbook;
