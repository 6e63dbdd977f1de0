pub mod dendrite;
pub mod engine;
pub mod error;
pub mod marker;
pub mod schema;

pub use engine::{run_analysis, AnalysisKind, AnalysisOutcome, SheetProblem, SheetWarning};
pub use error::SummaryError;

/// Leading column of every output table, holding the source sheet name.
pub const TAB_NAME_COLUMN: &str = "Tab Name";
