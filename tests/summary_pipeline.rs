use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;

use neuro_sheet_summary::services::summary::SheetProblem;
use neuro_sheet_summary::{run_analysis, AnalysisKind, AnalysisOutcome, SummaryError};

enum Cell<'a> {
    S(&'a str),
    N(f64),
}

fn write_book(path: &Path, sheets: &[(&str, &[&str], Vec<Vec<Cell>>)]) {
    let mut wb = Workbook::new();
    for (name, headers, rows) in sheets {
        let ws = wb.add_worksheet();
        ws.set_name(*name).unwrap();
        for (col, header) in headers.iter().enumerate() {
            ws.write_string(0, col as u16, *header).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::S(s) => ws.write_string(r as u32 + 1, c as u16, *s).unwrap(),
                    Cell::N(n) => ws.write_number(r as u32 + 1, c as u16, *n).unwrap(),
                };
            }
        }
    }
    wb.save(path).unwrap();
}

/// Rewrites the workbook at `path` without the given zip part.
fn drop_part(path: &Path, part: &str) {
    let bytes = std::fs::read(path).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(&mut out);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        if file.is_dir() || file.name() == part {
            continue;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        zip.start_file(file.name().to_string(), options).unwrap();
        zip.write_all(&buf).unwrap();
    }
    zip.finish().unwrap();
    std::fs::write(path, out.into_inner()).unwrap();
}

fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
    let mut wb: Xlsx<_> = open_workbook(path).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    range.rows().map(|r| r.to_vec()).collect()
}

fn sheet_names(path: &Path) -> Vec<String> {
    let wb: Xlsx<_> = open_workbook(path).unwrap();
    wb.sheet_names()
}

fn text(s: &str) -> Data {
    Data::String(s.to_string())
}

fn cell(rows: &[Vec<Data>], r: usize, c: usize) -> Data {
    rows.get(r).and_then(|row| row.get(c)).cloned().unwrap_or(Data::Empty)
}

const MARKER_HEADERS: &[&str] = &["Type", "Name", "Qty of Markers"];
const TREE_HEADERS: &[&str] = &["Tree", "Length Total(µm)", "Surface Total(µm²)", "Volume Total(µm³)"];

fn input(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("sample.xlsx")
}

#[test]
fn marker_summary_skips_sheets_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            (
                "S1",
                MARKER_HEADERS,
                vec![
                    vec![Cell::S("A"), Cell::S("x"), Cell::N(3.0)],
                    vec![Cell::S("A"), Cell::S("y"), Cell::N(2.0)],
                ],
            ),
            ("S2", &["Type", "Name"][..], vec![vec![Cell::S("A"), Cell::S("x")]]),
        ],
    );

    let outcome = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let AnalysisOutcome::Written { output_path, sheets_summarized, warnings } = outcome else {
        panic!("expected a written summary");
    };
    assert_eq!(output_path, dir.path().join("sample_Summary_Output.xlsx"));
    assert_eq!(sheets_summarized, 1);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].sheet, "S2");
    assert_eq!(warnings[0].problem, SheetProblem::MissingColumns(vec!["Qty of Markers".into()]));

    assert_eq!(sheet_names(&output_path), vec!["Marker Summary".to_string()]);
    let rows = read_sheet(&output_path, "Marker Summary");
    // Two header rows (Type over Name), then one row per summarized sheet.
    assert_eq!(rows.len(), 3);
    assert_eq!(cell(&rows, 0, 0), text("Tab Name"));
    assert_eq!(cell(&rows, 0, 1), text("A"));
    assert_eq!(cell(&rows, 1, 1), text("x"));
    assert_eq!(cell(&rows, 0, 2), text("A"));
    assert_eq!(cell(&rows, 1, 2), text("y"));
    assert_eq!(cell(&rows, 2, 0), text("S1"));
    assert_eq!(cell(&rows, 2, 1), Data::Float(3.0));
    assert_eq!(cell(&rows, 2, 2), Data::Float(2.0));
}

#[test]
fn marker_summary_sums_duplicates_and_zero_fills() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            (
                "Neuron 1",
                MARKER_HEADERS,
                vec![
                    vec![Cell::S("Spine"), Cell::S("A"), Cell::N(3.0)],
                    vec![Cell::S("Spine"), Cell::S("A"), Cell::N(5.0)],
                ],
            ),
            (
                "Neuron 2",
                MARKER_HEADERS,
                vec![vec![Cell::S("Spine"), Cell::S("B"), Cell::N(4.0)]],
            ),
        ],
    );

    let outcome = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    assert!(outcome.warnings().is_empty());
    let rows = read_sheet(outcome.output_path().unwrap(), "Marker Summary");

    assert_eq!(rows.len(), 4);
    assert_eq!(cell(&rows, 2, 0), text("Neuron 1"));
    assert_eq!(cell(&rows, 2, 1), Data::Float(8.0));
    assert_eq!(cell(&rows, 2, 2), Data::Float(0.0));
    assert_eq!(cell(&rows, 3, 0), text("Neuron 2"));
    assert_eq!(cell(&rows, 3, 1), Data::Float(0.0));
    assert_eq!(cell(&rows, 3, 2), Data::Float(4.0));
}

#[test]
fn marker_summary_accepts_single_key_layouts() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            ("ByName", &["Name", "Qty of Markers"][..], vec![vec![Cell::S("Soma"), Cell::N(1.0)]]),
            ("ByType", &["Type", "Count"][..], vec![vec![Cell::S("Dot"), Cell::N(6.0)]]),
        ],
    );

    let outcome = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    assert!(matches!(outcome, AnalysisOutcome::Written { sheets_summarized: 2, .. }));
    let rows = read_sheet(outcome.output_path().unwrap(), "Marker Summary");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![text("Tab Name"), text("Soma"), text("Dot")]);
    assert_eq!(rows[1], vec![text("ByName"), Data::Float(1.0), Data::Float(0.0)]);
    assert_eq!(rows[2], vec![text("ByType"), Data::Float(0.0), Data::Float(6.0)]);
}

#[test]
fn marker_summary_writes_empty_table_when_nothing_qualifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(&path, &[("Other", &["Foo"][..], vec![vec![Cell::N(1.0)]])]);

    let outcome = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let AnalysisOutcome::NoValidData { output_path: Some(output_path), warnings } = outcome else {
        panic!("expected an empty summary");
    };
    assert_eq!(warnings.len(), 1);
    let rows = read_sheet(&output_path, "Marker Summary");
    assert_eq!(rows, vec![vec![text("Tab Name")]]);
}

#[test]
fn marker_summary_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            ("B", MARKER_HEADERS, vec![vec![Cell::S("T"), Cell::S("n"), Cell::N(1.0)]]),
            ("A", MARKER_HEADERS, vec![vec![Cell::S("U"), Cell::S("m"), Cell::N(2.0)]]),
        ],
    );

    let first = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let first_rows = read_sheet(first.output_path().unwrap(), "Marker Summary");
    let second = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let second_rows = read_sheet(second.output_path().unwrap(), "Marker Summary");

    assert_eq!(first, second);
    assert_eq!(first_rows, second_rows);
    // Sheets keep file order, not alphabetical order.
    assert_eq!(cell(&first_rows, 2, 0), text("B"));
    assert_eq!(cell(&first_rows, 3, 0), text("A"));
}

#[test]
fn dendrite_summary_writes_both_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[(
            "Cell 1",
            TREE_HEADERS,
            vec![
                vec![Cell::N(1.0), Cell::N(10.0), Cell::N(100.0), Cell::N(1.0)],
                vec![Cell::N(2.0), Cell::N(20.0), Cell::N(200.0), Cell::N(2.0)],
                vec![Cell::N(3.0), Cell::N(30.0), Cell::N(300.0), Cell::N(3.0)],
            ],
        )],
    );

    let outcome = run_analysis(AnalysisKind::DendriteTrees, &path).unwrap();
    let output_path = outcome.output_path().unwrap().to_path_buf();
    assert_eq!(sheet_names(&output_path), vec!["Tab Summary".to_string(), "Tree Details".to_string()]);

    let summary = read_sheet(&output_path, "Tab Summary");
    assert_eq!(
        summary[0],
        vec![
            text("Tab Name"),
            text("Total Length (µm)"),
            text("Mean Length (µm)"),
            text("Total Surface (µm²)"),
            text("Mean Surface (µm²)"),
            text("Total Volume (µm³)"),
            text("Mean Volume (µm³)"),
            text("Number of Trees"),
        ]
    );
    assert_eq!(
        summary[1],
        vec![
            text("Cell 1"),
            Data::Float(60.0),
            Data::Float(20.0),
            Data::Float(600.0),
            Data::Float(200.0),
            Data::Float(6.0),
            Data::Float(2.0),
            Data::Float(3.0),
        ]
    );

    let details = read_sheet(&output_path, "Tree Details");
    assert_eq!(details.len(), 4);
    assert_eq!(
        details[0],
        vec![
            text("Tab Name"),
            text("Tree"),
            text("Length Total(µm)"),
            text("Surface Total(µm²)"),
            text("Volume Total(µm³)"),
        ]
    );
    assert_eq!(cell(&details, 3, 0), text("Cell 1"));
    assert_eq!(cell(&details, 3, 1), Data::Float(3.0));
    assert_eq!(cell(&details, 3, 2), Data::Float(30.0));
}

#[test]
fn dendrite_summary_leaves_mean_blank_for_treeless_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            ("Headers Only", TREE_HEADERS, vec![]),
            ("Cell 2", TREE_HEADERS, vec![vec![Cell::S("T1"), Cell::N(5.0), Cell::N(1.0), Cell::N(1.0)]]),
        ],
    );

    let outcome = run_analysis(AnalysisKind::DendriteTrees, &path).unwrap();
    assert!(matches!(outcome, AnalysisOutcome::Written { sheets_summarized: 2, .. }));

    let summary = read_sheet(outcome.output_path().unwrap(), "Tab Summary");
    assert_eq!(cell(&summary, 1, 0), text("Headers Only"));
    assert_eq!(cell(&summary, 1, 1), Data::Float(0.0));
    assert_eq!(cell(&summary, 1, 2), Data::Empty);
    assert_eq!(cell(&summary, 1, 7), Data::Float(0.0));

    let details = read_sheet(outcome.output_path().unwrap(), "Tree Details");
    assert_eq!(details.len(), 2);
    assert_eq!(cell(&details, 1, 1), text("T1"));
}

#[test]
fn dendrite_summary_writes_nothing_without_valid_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[("Markers", MARKER_HEADERS, vec![vec![Cell::S("A"), Cell::S("x"), Cell::N(1.0)]])],
    );

    let outcome = run_analysis(AnalysisKind::DendriteTrees, &path).unwrap();
    let AnalysisOutcome::NoValidData { output_path, warnings } = outcome else {
        panic!("expected no output");
    };
    assert_eq!(output_path, None);
    assert_eq!(
        warnings[0].problem,
        SheetProblem::MissingColumns(TREE_HEADERS.iter().map(|s| s.to_string()).collect())
    );
    assert!(!dir.path().join("sample_Summary_Output.xlsx").exists());
}

#[test]
fn corrupt_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    std::fs::write(&path, b"not a workbook").unwrap();

    let err = run_analysis(AnalysisKind::MarkerCount, &path).unwrap_err();
    assert!(matches!(err, SummaryError::File { .. }));
    assert!(!dir.path().join("sample_Summary_Output.xlsx").exists());
}

#[test]
fn existing_output_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    let output = dir.path().join("sample_Summary_Output.xlsx");
    std::fs::write(&output, b"stale").unwrap();
    write_book(&path, &[("S1", MARKER_HEADERS, vec![vec![Cell::S("A"), Cell::S("x"), Cell::N(1.0)]])]);

    run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let rows = read_sheet(&output, "Marker Summary");
    assert_eq!(cell(&rows, 2, 1), Data::Float(1.0));
}

#[test]
fn unreadable_sheet_is_reported_and_the_rest_summarized() {
    let dir = tempfile::tempdir().unwrap();
    let path = input(&dir);
    write_book(
        &path,
        &[
            ("S1", MARKER_HEADERS, vec![vec![Cell::S("A"), Cell::S("x"), Cell::N(4.0)]]),
            ("Broken", MARKER_HEADERS, vec![vec![Cell::S("A"), Cell::S("x"), Cell::N(9.0)]]),
        ],
    );
    drop_part(&path, "xl/worksheets/sheet2.xml");

    let outcome = run_analysis(AnalysisKind::MarkerCount, &path).unwrap();
    let AnalysisOutcome::Written { output_path, sheets_summarized, warnings } = outcome else {
        panic!("expected a written summary");
    };
    assert_eq!(sheets_summarized, 1);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].sheet, "Broken");
    assert!(matches!(warnings[0].problem, SheetProblem::Unreadable(_)));

    let rows = read_sheet(&output_path, "Marker Summary");
    assert_eq!(cell(&rows, 2, 0), text("S1"));
    assert_eq!(cell(&rows, 2, 1), Data::Float(4.0));
    assert_eq!(cell(&rows, 3, 0), Data::Empty);
}
