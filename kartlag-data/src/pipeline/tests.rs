//! Unit tests for the pipeline wiring.

use std::io;
use std::sync::Arc;

use kartlag_core::{BulkWriter, ParentSlot};
use kartlag_scorer::BoostConfig;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::geojson::GeoJsonCollectionReader;
use crate::input::InputSource;
use crate::source::GeoJsonOptions;

fn collection(features: &[Value]) -> GeoJsonCollectionReader {
    let text = json!({ "type": "FeatureCollection", "features": features }).to_string();
    GeoJsonCollectionReader::new(
        vec![InputSource::stream("memory.json", io::Cursor::new(text.into_bytes()))],
        GeoJsonOptions::default(),
    )
}

fn point(id: &str, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": properties,
        "geometry": { "type": "Point", "coordinates": [10.75, 59.91] },
    })
}

fn ids(commands: &[IndexCommand]) -> Vec<&str> {
    commands
        .iter()
        .map(|command| command.document.source_id.as_str())
        .collect()
}

#[fixture]
fn scorer() -> PopularityScorer {
    let config = BoostConfig::from_json_str(
        r#"{
            "defaultValue": 1000,
            "stopTypeFactors": {
                "railStation": {"*": 2, "highSpeedRail": 6},
                "busStation": {"*": 2}
            },
            "interchangeFactors": {"preferredInterchange": 10}
        }"#,
    )
    .expect("valid boost config");
    PopularityScorer::new(Arc::new(config))
}

struct FailingSink {
    attempts: u64,
}

impl CommandSink for FailingSink {
    fn accept(&mut self, _command: IndexCommand) -> Result<(), BulkWriteError> {
        self.attempts += 1;
        Err(BulkWriteError::Io(io::Error::other("disk full")))
    }
}

#[rstest]
fn streaming_writes_two_lines_per_record_in_order(scorer: PopularityScorer) {
    let reader = collection(&[
        point("a", json!({ "name": "Alpha" })),
        point("b", json!({ "name": "Beta" })),
        point("c", json!({ "name": "Gamma" })),
    ]);
    let mut writer = BulkWriter::new(Vec::new());

    let report = Pipeline::new(reader, scorer, PipelineConfig::default())
        .run(&mut writer)
        .expect("pipeline runs");

    assert_eq!(report.commands, 3);
    assert_eq!(report.read.records, 3);
    assert_eq!(writer.lines_written(), 6);
    let output = String::from_utf8(writer.finish().expect("flush")).expect("utf-8");
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines[0]["index"]["_id"], "geojson:venue:a");
    assert_eq!(lines[1]["source_id"], "a");
    assert_eq!(lines[4]["index"]["_id"], "geojson:venue:c");
}

#[rstest]
fn deduplicated_mode_keeps_the_larger_record(scorer: PopularityScorer) {
    let reader = collection(&[
        point("small", json!({ "name": "Park", "ref": "P1", "area": 5 })),
        point("other", json!({ "name": "Pier", "ref": "P2", "area": 1 })),
        point("large", json!({ "name": "Park", "ref": "P1", "area": 20 })),
    ]);
    let config = PipelineConfig {
        mode: PipelineMode::Deduplicated {
            key: "ref".into(),
            comparator: "area".into(),
        },
        ..PipelineConfig::default()
    };
    let mut commands = Vec::new();

    let report = Pipeline::new(reader, scorer, config)
        .run(&mut commands)
        .expect("pipeline runs");

    assert_eq!(ids(&commands), ["large", "other"]);
    assert_eq!(report.deduplicated, 1);
}

#[rstest]
fn hierarchical_mode_scores_parent_stops_from_child_modes(scorer: PopularityScorer) {
    let reader = collection(&[
        point(
            "NSR:StopPlace:2",
            json!({
                "placeType": "stopPlace",
                "name": "Oslo S bussterminal",
                "parentId": "NSR:StopPlace:1",
                "stopPlaceType": "busStation",
            }),
        ),
        point(
            "NSR:StopPlace:1",
            json!({
                "placeType": "stopPlace",
                "name": "Oslo S",
                "stopPlaceType": "railStation",
                "subMode": "highSpeedRail",
                "interchangeWeighting": "preferredInterchange",
            }),
        ),
    ]);
    let config = PipelineConfig {
        mode: PipelineMode::Hierarchical,
        mapper: MapperConfig {
            parent_slot: Some(ParentSlot::StopPlace),
        },
        ..PipelineConfig::default()
    };
    let mut commands = Vec::new();

    Pipeline::new(reader, scorer, config)
        .run(&mut commands)
        .expect("pipeline runs");

    assert_eq!(ids(&commands), ["NSR:StopPlace:1", "NSR:StopPlace:2"]);
    assert_eq!(commands[0].document.popularity, Some(80_000));
    assert_eq!(commands[1].document.popularity, Some(2_000));
}

#[rstest]
fn gathering_modes_leave_the_sink_untouched_on_read_failure(scorer: PopularityScorer) {
    let reader = GeoJsonCollectionReader::new(
        vec![InputSource::stream("broken.json", io::Cursor::new(b"{\"type\": ".to_vec()))],
        GeoJsonOptions::default(),
    );
    let config = PipelineConfig {
        mode: PipelineMode::Hierarchical,
        ..PipelineConfig::default()
    };
    let mut commands = Vec::new();

    let err = Pipeline::new(reader, scorer, config)
        .run(&mut commands)
        .expect_err("input is malformed");

    assert!(matches!(err, PipelineError::Read(ReadError::ParseJson { .. })));
    assert!(commands.is_empty());
}

#[rstest]
fn sink_failure_cancels_the_reader(scorer: PopularityScorer) {
    let features: Vec<Value> = (0..64)
        .map(|n| point(&n.to_string(), json!({ "name": "Bench" })))
        .collect();
    let config = PipelineConfig {
        queue_capacity: 1,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(collection(&features), scorer, config);
    let cancel = pipeline.cancellation().clone();
    let mut sink = FailingSink { attempts: 0 };

    let err = pipeline.run(&mut sink).expect_err("sink fails");

    assert!(matches!(err, PipelineError::Sink(BulkWriteError::Io(_))));
    assert_eq!(sink.attempts, 1);
    assert!(cancel.is_cancelled());
}

#[rstest]
fn cancelled_signal_stops_the_run(scorer: PopularityScorer) {
    let cancel = CancellationSignal::new();
    cancel.cancel();
    let mut commands = Vec::new();

    let err = Pipeline::new(
        collection(&[point("a", json!({ "name": "Alpha" }))]),
        scorer,
        PipelineConfig::default(),
    )
    .with_cancellation(cancel)
    .run(&mut commands)
    .expect_err("run is cancelled");

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(commands.is_empty());
}

#[rstest]
fn concurrent_jobs_fail_independently() {
    type Job = Box<dyn FnOnce() -> Result<u64, PipelineError> + Send>;
    let jobs: Vec<Job> = vec![
        Box::new(|| Ok(1)),
        Box::new(|| Err(PipelineError::Cancelled)),
        Box::new(|| panic!("worker blew up")),
        Box::new(|| Ok(4)),
    ];

    let results = run_concurrently(jobs);

    assert!(matches!(results[0], Ok(1)));
    assert!(matches!(results[1], Err(PipelineError::Cancelled)));
    assert!(matches!(results[2], Err(PipelineError::WorkerPanicked)));
    assert!(matches!(results[3], Ok(4)));
}
