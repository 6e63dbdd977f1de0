use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::services::summary::schema::{DENDRITE_COLUMNS, MARKER_VARIANTS};
use crate::services::summary::{AnalysisKind, AnalysisOutcome};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub analysis: AnalysisKind,
    pub input_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: AnalysisKind,
    pub name: &'static str,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    /// Human-readable warnings, one per skipped sheet, in sheet order.
    pub messages: Vec<String>,
}

impl AnalyzeResponse {
    pub fn new(analysis: AnalysisKind, outcome: AnalysisOutcome) -> Self {
        let mut messages: Vec<String> = outcome.warnings().iter().map(|w| w.to_string()).collect();
        if let AnalysisOutcome::NoValidData { .. } = outcome {
            messages.push("No valid data found in the selected file.".to_string());
        }
        Self {
            analysis,
            name: analysis.display_name(),
            outcome,
            messages,
        }
    }
}

/// What an analysis does and which column sets make a sheet eligible.
#[derive(Debug, Serialize)]
pub struct AnalysisDescription {
    pub analysis: AnalysisKind,
    pub name: &'static str,
    pub description: &'static str,
    pub accepted_layouts: Vec<Vec<&'static str>>,
}

impl AnalysisDescription {
    pub fn for_kind(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::MarkerCount => Self {
                analysis: kind,
                name: kind.display_name(),
                description: "Summarizes marker counts by type and name across all sheets.",
                accepted_layouts: MARKER_VARIANTS.iter().map(|v| v.required_columns()).collect(),
            },
            AnalysisKind::DendriteTrees => Self {
                analysis: kind,
                name: kind.display_name(),
                description: "Summarizes dendrite tree metrics (length, surface, volume) per tree and per sheet.",
                accepted_layouts: vec![DENDRITE_COLUMNS.to_vec()],
            },
        }
    }
}
