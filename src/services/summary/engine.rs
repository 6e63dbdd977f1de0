use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::dendrite::DendriteAggregate;
use super::error::SummaryError;
use super::marker::{MarkerCountAggregate, MARKER_SHEET_LABEL};
use super::schema::{self, Validation, DENDRITE_COLUMNS};
use crate::services::excel::reader::WorkbookReader;
use crate::services::excel::types::{NamedTable, Sheet};
use crate::services::excel::utils::derive_output_path;
use crate::services::excel::writer::write_workbook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    MarkerCount,
    DendriteTrees,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 2] = [AnalysisKind::MarkerCount, AnalysisKind::DendriteTrees];

    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisKind::MarkerCount => "Marker Count Summary",
            AnalysisKind::DendriteTrees => "Dendrite Trees Summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SheetProblem {
    MissingColumns(Vec<String>),
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetWarning {
    pub sheet: String,
    pub problem: SheetProblem,
}

impl fmt::Display for SheetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            SheetProblem::MissingColumns(cols) => write!(
                f,
                "Sheet '{}' does not contain the required columns: {}",
                self.sheet,
                cols.join(", ")
            ),
            SheetProblem::Unreadable(msg) => write!(f, "Sheet '{}' could not be read: {}", self.sheet, msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Written {
        output_path: PathBuf,
        sheets_summarized: usize,
        warnings: Vec<SheetWarning>,
    },
    /// No sheet qualified. The marker analysis still writes an empty table;
    /// the dendrite analysis writes nothing.
    NoValidData {
        output_path: Option<PathBuf>,
        warnings: Vec<SheetWarning>,
    },
}

impl AnalysisOutcome {
    pub fn warnings(&self) -> &[SheetWarning] {
        match self {
            AnalysisOutcome::Written { warnings, .. } | AnalysisOutcome::NoValidData { warnings, .. } => warnings,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            AnalysisOutcome::Written { output_path, .. } => Some(output_path),
            AnalysisOutcome::NoValidData { output_path, .. } => output_path.as_deref(),
        }
    }
}

/// Where a run currently is. Skipped sheets return control to the sheet loop;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Loading,
    Validating,
    Skipped,
    Accumulating,
    Finalizing,
    Writing,
    Done,
    Failed,
}

struct Run {
    kind: AnalysisKind,
    state: RunState,
}

impl Run {
    fn new(kind: AnalysisKind) -> Self {
        Self { kind, state: RunState::Idle }
    }

    fn enter(&mut self, next: RunState) {
        tracing::debug!("{}: {:?} -> {:?}", self.kind.display_name(), self.state, next);
        self.state = next;
    }

    fn fail<T>(&mut self, err: SummaryError) -> Result<T, SummaryError> {
        self.enter(RunState::Failed);
        tracing::error!("{} failed: {}", self.kind.display_name(), err);
        Err(err)
    }
}

/// Per-pipeline fold over eligible sheets.
trait Reducer {
    /// An error skips the sheet and becomes its warning.
    fn fold(&mut self, sheet: &Sheet) -> Result<(), SheetProblem>;
    fn folded(&self) -> usize;
    /// `None` means nothing is written.
    fn finish(self: Box<Self>, empty: bool) -> Option<Vec<NamedTable>>;
}

impl Reducer for MarkerCountAggregate {
    fn fold(&mut self, sheet: &Sheet) -> Result<(), SheetProblem> {
        let variant = schema::select_marker_variant(sheet).map_err(SheetProblem::MissingColumns)?;
        self.accumulate(sheet, variant)
            .map_err(|e| SheetProblem::Unreadable(e.to_string()))
    }

    fn folded(&self) -> usize {
        self.sheet_count()
    }

    fn finish(self: Box<Self>, _empty: bool) -> Option<Vec<NamedTable>> {
        Some(vec![NamedTable::new(MARKER_SHEET_LABEL, (*self).finalize())])
    }
}

impl Reducer for DendriteAggregate {
    fn fold(&mut self, sheet: &Sheet) -> Result<(), SheetProblem> {
        if let Validation::Missing(missing) = schema::validate(sheet, &DENDRITE_COLUMNS) {
            return Err(SheetProblem::MissingColumns(missing));
        }
        self.accumulate(sheet)
            .map_err(|e| SheetProblem::Unreadable(e.to_string()))
    }

    fn folded(&self) -> usize {
        self.sheet_count()
    }

    fn finish(self: Box<Self>, empty: bool) -> Option<Vec<NamedTable>> {
        (!empty).then(|| (*self).finalize())
    }
}

fn reducer_for(kind: AnalysisKind) -> Box<dyn Reducer> {
    match kind {
        AnalysisKind::MarkerCount => Box::new(MarkerCountAggregate::new()),
        AnalysisKind::DendriteTrees => Box::new(DendriteAggregate::new()),
    }
}

/// Runs one analysis over the workbook at `input_path` and writes the summary
/// next to it as `<name>_Summary_Output.xlsx`.
///
/// Sheet-level problems never abort the run: they are collected and returned
/// with the outcome. Only an unreadable input or a failed write is an error.
pub fn run_analysis(kind: AnalysisKind, input_path: &Path) -> Result<AnalysisOutcome, SummaryError> {
    let start = std::time::Instant::now();
    let mut run = Run::new(kind);
    tracing::info!("Starting {} for {}", kind.display_name(), input_path.display());

    run.enter(RunState::Loading);
    let mut reader = match WorkbookReader::open(input_path) {
        Ok(reader) => reader,
        Err(e) => return run.fail(e),
    };

    let mut reducer = reducer_for(kind);
    let mut warnings = Vec::new();
    let sheet_names = reader.sheet_names().to_vec();

    for sheet_name in &sheet_names {
        run.enter(RunState::Validating);
        let folded = reader
            .read_sheet(sheet_name)
            .map_err(|e| match e {
                SummaryError::Sheet { message, .. } => SheetProblem::Unreadable(message),
                other => SheetProblem::Unreadable(other.to_string()),
            })
            .and_then(|sheet| reducer.fold(&sheet));

        match folded {
            Ok(()) => run.enter(RunState::Accumulating),
            Err(problem) => {
                run.enter(RunState::Skipped);
                let warning = SheetWarning {
                    sheet: sheet_name.clone(),
                    problem,
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }
    drop(reader);

    run.enter(RunState::Finalizing);
    let summarized = reducer.folded();
    let empty = summarized == 0;
    if empty {
        tracing::warn!("No valid data found in {}", input_path.display());
    }

    let Some(tables) = reducer.finish(empty) else {
        run.enter(RunState::Done);
        return Ok(AnalysisOutcome::NoValidData {
            output_path: None,
            warnings,
        });
    };

    run.enter(RunState::Writing);
    let output_path = derive_output_path(input_path);
    if let Err(e) = write_workbook(&output_path, &tables) {
        return run.fail(e);
    }

    run.enter(RunState::Done);
    tracing::info!(
        "{} saved to {} ({} sheets summarized, {} skipped) in {:?}",
        kind.display_name(),
        output_path.display(),
        summarized,
        warnings.len(),
        start.elapsed()
    );

    Ok(if empty {
        AnalysisOutcome::NoValidData {
            output_path: Some(output_path),
            warnings,
        }
    } else {
        AnalysisOutcome::Written {
            output_path,
            sheets_summarized: summarized,
            warnings,
        }
    })
}
