mod common;

use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_structure_selector::app::{App, InputSource, ResolveRequest, score_structures};
use kira_structure_selector::domain::ExperimentalMethod;
use kira_structure_selector::download::DownloadCoordinator;
use kira_structure_selector::error::SelectorError;
use kira_structure_selector::pipeline::{CancellationToken, ResolutionPipeline};

use common::{MockMetadata, MockResolver, MockSource, meta, structure, temp_store};

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

fn app(temp: &tempfile::TempDir) -> App<MockResolver, MockMetadata, MockSource> {
    let resolver = MockResolver::default()
        .with("P69905", &["2dn2", "1a3n"])
        .with("P68871", &["1a3n"]);
    let metadata = MockMetadata::default()
        .with("2dn2", meta(ExperimentalMethod::Xray, 12, 1.0))
        .with("1a3n", meta(ExperimentalMethod::Xray, 40, 1.0));
    let downloads = DownloadCoordinator::new(MockSource::default(), temp_store(temp)).unwrap();
    let pipeline = ResolutionPipeline::new(resolver, metadata, downloads, 4).unwrap();
    App::new(pipeline, "NA".to_string())
}

#[test]
fn resolve_table_writes_mapping_and_annotation() {
    let temp = tempfile::tempdir().unwrap();
    let input = utf8(temp.path().join("combined_metadata.csv"));
    fs::copy("tests/fixtures/combined_metadata.csv", input.as_std_path()).unwrap();
    let mapping_path = utf8(temp.path().join("out/mapping.tsv"));
    let annotated_path = utf8(temp.path().join("out/annotated.csv"));

    let app = app(&temp);
    let request = ResolveRequest {
        input: InputSource::detect(input, None),
        mapping: Some(mapping_path.clone()),
        annotate: Some(annotated_path.clone()),
    };
    let report = app.resolve(&request, &CancellationToken::new()).unwrap();

    assert_eq!(report.proteins, 3);
    assert_eq!(report.outcomes.selected, 2);
    assert_eq!(report.outcomes.no_candidates, 1);
    assert_eq!(report.downloads.downloaded, 1);
    assert_eq!(app.pipeline().downloads().source().calls_for("1a3n"), 1);

    let mapping = fs::read_to_string(mapping_path.as_std_path()).unwrap();
    assert_eq!(
        mapping,
        "protein_id\tstructure_id\nP68871\t1a3n\nP69905\t1a3n\nQ00000\tNA\n"
    );

    let annotated = fs::read_to_string(annotated_path.as_std_path()).unwrap();
    let lines: Vec<&str> = annotated.lines().collect();
    assert_eq!(lines[0], "Entry,Entry Name,Label,Selected_PDB");
    assert_eq!(lines[1], "P69905,HBA_HUMAN,1,1a3n");
    assert_eq!(lines[3], "Q00000,FAKE_HUMAN,1,NA");
    assert_eq!(lines[4], ",EMPTY_ROW,0,NA");
    assert_eq!(lines.len(), 6);
}

#[test]
fn annotate_requires_a_table() {
    let temp = tempfile::tempdir().unwrap();
    let input = utf8(temp.path().join("ids.txt"));
    fs::write(input.as_std_path(), "P69905\n").unwrap();

    let app = app(&temp);
    let request = ResolveRequest {
        input: InputSource::detect(input, None),
        mapping: None,
        annotate: Some(utf8(temp.path().join("annotated.tsv"))),
    };
    let err = app.resolve(&request, &CancellationToken::new()).unwrap_err();
    assert_matches!(err, SelectorError::InvalidConfig(_));
    assert_eq!(app.pipeline().downloads().source().call_count(), 0);
}

#[test]
fn resolve_plain_list() {
    let temp = tempfile::tempdir().unwrap();
    let input = utf8(temp.path().join("ids.txt"));
    fs::write(input.as_std_path(), "# proteins\nP68871\n\nP00000\n").unwrap();

    let app = app(&temp);
    let request = ResolveRequest {
        input: InputSource::detect(input, None),
        mapping: None,
        annotate: None,
    };
    let report = app.resolve(&request, &CancellationToken::new()).unwrap();

    assert_eq!(report.proteins, 2);
    assert_eq!(report.results.len(), 2);
    let selected: Vec<Option<&str>> = report
        .results
        .iter()
        .map(|result| result.selected_structure_id.as_ref().map(|id| id.as_str()))
        .collect();
    assert_eq!(selected, vec![None, Some("1a3n")]);
}

#[test]
fn missing_column_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let input = utf8(temp.path().join("meta.tsv"));
    fs::write(input.as_std_path(), "Accession\tName\nP69905\tHBA\n").unwrap();

    let app = app(&temp);
    let request = ResolveRequest {
        input: InputSource::detect(input, None),
        mapping: None,
        annotate: None,
    };
    let err = app.resolve(&request, &CancellationToken::new()).unwrap_err();
    assert_matches!(err, SelectorError::MissingColumn(column) if column == "Entry");
}

#[test]
fn score_ranks_without_downloading() {
    let metadata = MockMetadata::default()
        .with("1abc", meta(ExperimentalMethod::Xray, 50, 0.9))
        .with("2xyz", meta(ExperimentalMethod::Em, 80, 0.95));

    let result = score_structures(
        &metadata,
        &[structure("1abc"), structure("2xyz"), structure("3zzz")],
    );

    assert_eq!(result.selected.as_deref(), Some("1abc"));
    assert_eq!(result.candidates.len(), 3);
    assert!((result.candidates[0].score.unwrap() - 4500.9).abs() < 1e-9);
    assert!((result.candidates[1].score.unwrap() - 3800.95).abs() < 1e-9);
    assert!(result.candidates[2].score.is_none());
}

#[test]
fn score_single_entry_needs_metadata() {
    let result = score_structures(&MockMetadata::default(), &[structure("1abc")]);
    assert!(result.selected.is_none());
}
