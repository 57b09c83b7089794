//! Source ingestion for the Kartlag place indexer.
//!
//! Responsibilities:
//! - Read OSM PBF extracts, GeoJSON features and collections, and SOSI
//!   survey text into [`SourcePlace`] records.
//! - Collapse duplicates, group parents and children, and map records into
//!   canonical places.
//! - Wire a reader through a bounded, cancellable queue into a bulk sink.
//!
//! Boundaries:
//! - Scoring rules live in `kartlag-scorer`; document shapes in `kartlag-core`.
//! - Readers block on I/O; run them on their own threads.
//!
//! Invariants:
//! - Each input file is read to completion or fails with an error naming it.
//! - Records reference their parents by id only.
//! - No global mutable state.

mod dedup;
mod error;
mod geojson;
mod hierarchy;
mod input;
mod mapper;
mod osm;
mod pipeline;
mod queue;
mod reader;
mod source;
mod spool;
mod survey;

pub use dedup::deduplicate;
pub use error::ReadError;
pub use geojson::{GeoJsonCollectionReader, GeoJsonFeatureReader};
pub use hierarchy::{PlaceHierarchy, assemble};
pub use input::InputSource;
pub use mapper::{CanonicalMapper, MapperConfig, MapperStats};
pub use osm::{FilterError, PbfReader, PbfSummary, PoiFilter};
pub use pipeline::{
    CommandSink, DEFAULT_INDEX_NAME, DEFAULT_QUEUE_CAPACITY, Pipeline, PipelineConfig,
    PipelineError, PipelineMode, PipelineReport, run_concurrently,
};
pub use queue::{CancellationSignal, QueueError, QueueReceiver, QueueSender, bounded_queue};
pub use reader::{PlaceReader, ReadSummary, RecordVisitor};
pub use source::{
    GeoJsonFeature, GeoJsonOptions, GeoJsonPlace, OsmElementRef, OsmPlace, PlaceRecord,
    PropertyValue, SourceFormat, SourcePlace, SurveyObjectKind, SurveyPlace,
};
pub use spool::spool_to_tempfile;
pub use survey::SurveyReader;
