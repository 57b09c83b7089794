//! Behavioural tests for [`Pipeline`] and [`run_concurrently`].

use std::cell::RefCell;
use std::sync::Arc;

use camino::Utf8PathBuf;
use kartlag_core::{BulkWriter, IndexCommand, ParentSlot, sort_by_popularity};
use kartlag_data::{
    GeoJsonCollectionReader, GeoJsonOptions, InputSource, MapperConfig, Pipeline, PipelineConfig,
    PipelineError, PipelineMode, PipelineReport, ReadError, run_concurrently,
};
use kartlag_scorer::{PopularityScorer, load_boost_config};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

mod support;

use support::{fixtures_dir, scenario_titles};

const FEATURE: &str = "tests/features/pipeline.feature";

#[derive(Default)]
struct PipelineWorld {
    files: RefCell<Vec<Utf8PathBuf>>,
    config: RefCell<PipelineConfig>,
    output: RefCell<Vec<Value>>,
    commands: RefCell<Vec<IndexCommand>>,
    results: RefCell<Vec<Result<PipelineReport, PipelineError>>>,
}

impl PipelineWorld {
    fn pipeline(&self, path: Utf8PathBuf) -> Pipeline<GeoJsonCollectionReader> {
        let reader = GeoJsonCollectionReader::new(
            vec![InputSource::from(path)],
            GeoJsonOptions::default(),
        );
        Pipeline::new(reader, scorer(), self.config.borrow().clone())
    }

    fn only_file(&self) -> Utf8PathBuf {
        self.files.borrow().first().cloned().expect("file prepared")
    }

    fn indexed_names(&self) -> Vec<String> {
        self.output
            .borrow()
            .iter()
            .skip(1)
            .step_by(2)
            .map(|body| body["name"]["default"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}

fn scorer() -> PopularityScorer {
    let config = load_boost_config(&fixtures_dir().join("boost.json")).expect("valid config");
    PopularityScorer::new(Arc::new(config))
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld::default()
}

#[given("the parks collection in streaming mode")]
fn parks_streaming(world: &PipelineWorld) {
    world.files.replace(vec![fixtures_dir().join("parks.geojson")]);
}

#[given("the parks collection deduplicated on ref by area")]
fn parks_deduplicated(world: &PipelineWorld) {
    world.files.replace(vec![fixtures_dir().join("parks.geojson")]);
    world.config.borrow_mut().mode = PipelineMode::Deduplicated {
        key: "ref".to_owned(),
        comparator: "area".to_owned(),
    };
}

#[given("the stop places collection grouped into hierarchies")]
fn stops_grouped(world: &PipelineWorld) {
    world.files.replace(vec![fixtures_dir().join("stops.geojson")]);
    let mut config = world.config.borrow_mut();
    config.mode = PipelineMode::Hierarchical;
    config.mapper = MapperConfig {
        parent_slot: Some(ParentSlot::StopPlace),
    };
}

#[given("the stop places collection and the truncated collection")]
fn stops_and_truncated(world: &PipelineWorld) {
    world.files.replace(vec![
        fixtures_dir().join("stops.geojson"),
        fixtures_dir().join("broken.geojson"),
    ]);
}

#[when("I run the pipeline into a bulk writer")]
fn run_into_writer(world: &PipelineWorld) {
    let mut writer = BulkWriter::new(Vec::new());
    world
        .pipeline(world.only_file())
        .run(&mut writer)
        .expect("pipeline runs");
    let bytes = writer.finish().expect("output flushes");
    let text = String::from_utf8(bytes).expect("output is UTF-8");
    let lines = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    world.output.replace(lines);
}

#[when("I run the pipeline and sort by popularity")]
fn run_and_sort(world: &PipelineWorld) {
    let mut commands = Vec::new();
    world
        .pipeline(world.only_file())
        .run(&mut commands)
        .expect("pipeline runs");
    sort_by_popularity(&mut commands);
    world.commands.replace(commands);
}

#[when("I run one pipeline per file concurrently")]
fn run_per_file(world: &PipelineWorld) {
    let pipelines: Vec<_> = world
        .files
        .borrow()
        .iter()
        .map(|path| world.pipeline(path.clone()))
        .collect();
    let jobs: Vec<_> = pipelines
        .into_iter()
        .map(|pipeline| {
            move || {
                let mut commands: Vec<IndexCommand> = Vec::new();
                pipeline.run(&mut commands)
            }
        })
        .collect();
    world.results.replace(run_concurrently(jobs));
}

#[then("the output alternates {count} headers and bodies")]
fn alternating_output(world: &PipelineWorld, count: usize) {
    let output = world.output.borrow();
    assert_eq!(output.len(), count * 2);
    for pair in output.chunks(2) {
        assert!(pair[0].get("index").is_some(), "expected a header, got {}", pair[0]);
        assert_eq!(pair[1]["layer"], "venue");
    }
}

#[then("every park carries the configured popularity")]
fn park_popularity(world: &PipelineWorld) {
    for body in world.output.borrow().iter().skip(1).step_by(2) {
        assert_eq!(body["popularity"], 3);
    }
}

#[then("the indexed parks are Frognerparken, Torshovparken and Slottsparken")]
fn deduplicated_parks(world: &PipelineWorld) {
    assert_eq!(
        world.indexed_names(),
        ["Frognerparken", "Torshovparken", "Slottsparken"]
    );
}

#[then("the stop popularities are 80000, 2000 and 1000")]
fn stop_popularities(world: &PipelineWorld) {
    let commands = world.commands.borrow();
    let ranked: Vec<(&str, Option<i64>)> = commands
        .iter()
        .map(|command| (command.document.source_id.as_str(), command.document.popularity))
        .collect();
    assert_eq!(
        ranked,
        [
            ("NSR:StopPlace:1", Some(80_000)),
            ("NSR:StopPlace:2", Some(2_000)),
            ("NSR:StopPlace:3", Some(1_000)),
        ]
    );
}

#[then("the stop places succeed and the truncated collection fails")]
fn isolated_failure(world: &PipelineWorld) {
    let results = world.results.borrow();
    assert_eq!(results.len(), 2);
    let report = results[0].as_ref().expect("stop places index");
    assert_eq!(report.commands, 3);
    assert!(matches!(
        results[1],
        Err(PipelineError::Read(ReadError::ParseJson { .. }))
    ));
}

#[test]
fn scenario_indices_follow_feature_order() {
    assert_eq!(
        scenario_titles(FEATURE),
        [
            "writing bulk commands for a collection",
            "deduplicating overlapping parks",
            "scoring stop place hierarchies",
            "isolating a failing file",
        ]
    );
}

#[scenario(path = "tests/features/pipeline.feature", index = 0)]
fn writing_bulk_commands(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 1)]
fn deduplicating_parks(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 2)]
fn scoring_stop_hierarchies(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/pipeline.feature", index = 3)]
fn isolating_failing_file(world: PipelineWorld) {
    let _ = world;
}
