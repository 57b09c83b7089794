//! Pipeline integration tests covering the index command flow.

use super::helpers::{Workspace, bodies, decode_pbf_fixture, fixture_path, read_bulk};
use super::*;
use rstest::rstest;
use serde_json::Value;

fn source_ids(bodies: &[Value]) -> Vec<&str> {
    bodies
        .iter()
        .map(|body| body["source_id"].as_str().expect("source id"))
        .collect()
}

#[rstest]
fn stop_places_are_written_by_popularity() {
    let workspace = Workspace::new();
    let args = IndexArgs {
        stop_places: vec![fixture_path("stops.geojson")],
        boost_config: Some(fixture_path("boost.json")),
        output_dir: Some(workspace.output_dir()),
        sort_by_popularity: true,
        ..IndexArgs::default()
    };

    let outcome = run_index(args).expect("index should succeed");

    let [file] = outcome.files.as_slice() else {
        panic!("expected one file report, got {:?}", outcome.files);
    };
    assert_eq!(file.output, workspace.output_dir().join("00-stops.geojson.ndjson"));
    assert_eq!(file.report.commands, 3);
    let lines = read_bulk(&file.output);
    assert_eq!(lines[0]["index"]["_index"], "places");
    let popularity: Vec<Option<i64>> = bodies(&file.output)
        .iter()
        .map(|body| body["popularity"].as_i64())
        .collect();
    assert_eq!(popularity, [Some(80_000), Some(2_000), Some(1_000)]);
}

#[rstest]
fn collections_are_deduplicated_into_a_named_index() {
    let workspace = Workspace::new();
    let args = IndexArgs {
        collection: vec![fixture_path("parks.geojson")],
        boost_config: Some(fixture_path("boost.json")),
        output_dir: Some(workspace.output_dir()),
        index_name: Some("parker".to_owned()),
        dedup_key: Some("ref".to_owned()),
        dedup_compare: Some("area".to_owned()),
        ..IndexArgs::default()
    };

    let outcome = run_index(args).expect("index should succeed");

    let output = &outcome.files[0].output;
    assert_eq!(outcome.files[0].report.deduplicated, 1);
    let lines = read_bulk(output);
    assert!(
        lines
            .iter()
            .step_by(2)
            .all(|header| header["index"]["_index"] == "parker")
    );
    let names: Vec<&str> = lines
        .iter()
        .skip(1)
        .step_by(2)
        .map(|body| body["name"]["default"].as_str().expect("name"))
        .collect();
    assert_eq!(names, ["Frognerparken", "Torshovparken", "Slottsparken"]);
}

#[rstest]
fn pbf_extracts_honour_the_poi_filter() {
    let workspace = Workspace::new();
    let pbf = decode_pbf_fixture(workspace.root(), "places");
    let args = IndexArgs {
        pbf: vec![pbf],
        poi_filter: vec!["amenity".to_owned()],
        output_dir: Some(workspace.output_dir()),
        ..IndexArgs::default()
    };

    let outcome = run_index(args).expect("index should succeed");

    let written = bodies(&outcome.files[0].output);
    assert_eq!(source_ids(&written), ["node/1"]);
    assert_eq!(written[0]["category"], serde_json::json!(["amenity=cafe"]));
}

#[rstest]
fn survey_files_link_children_to_their_parents() {
    let workspace = Workspace::new();
    let args = IndexArgs {
        survey: vec![fixture_path("municipalities.sos")],
        output_dir: Some(workspace.output_dir()),
        ..IndexArgs::default()
    };

    let outcome = run_index(args).expect("index should succeed");

    let written = bodies(&outcome.files[0].output);
    let mut ids = source_ids(&written);
    ids.sort_unstable();
    assert_eq!(ids, ["1001", "55", "5501"]);
    let place_name = written
        .iter()
        .find(|body| body["source_id"] == "1001")
        .expect("place name document");
    assert_eq!(place_name["parent"]["locality_id"], "5501");
}

#[rstest]
fn a_failing_input_does_not_stop_its_siblings() {
    let workspace = Workspace::new();
    let args = IndexArgs {
        collection: vec![fixture_path("stops.geojson"), fixture_path("broken.geojson")],
        output_dir: Some(workspace.output_dir()),
        ..IndexArgs::default()
    };

    let err = run_index(args).expect_err("the truncated collection fails");

    match err {
        CliError::InputsFailed { failed, total } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected InputsFailed, found {other:?}"),
    }
    let healthy = read_bulk(&workspace.output_dir().join("00-stops.geojson.ndjson"));
    assert_eq!(healthy.len(), 6);
}

#[rstest]
fn missing_inputs_fail_before_any_output() {
    let workspace = Workspace::new();
    let args = IndexArgs {
        collection: vec![workspace.root().join("absent.geojson")],
        output_dir: Some(workspace.output_dir()),
        ..IndexArgs::default()
    };

    let err = run_index(args).expect_err("missing input should fail");

    match err {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_COLLECTION),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!workspace.output_dir().exists());
}
