//! Facade crate for the Kartlag place indexer.
//!
//! This crate re-exports the canonical place model, the format readers and
//! pipeline, and the popularity scorer so embedders need a single dependency.

#![forbid(unsafe_code)]

pub use kartlag_core::{
    BulkWriteError, BulkWriter, CanonicalPlace, DocumentEmitter, EmitterConfig, GeometryError,
    IndexCommand, IndexDocument, Layer, ParentSlot, PlaceGeometry, PlaceType, StopPlaceType,
    SubMode, sort_by_popularity,
};

pub use kartlag_data::{
    CancellationSignal, CanonicalMapper, GeoJsonCollectionReader, GeoJsonFeatureReader,
    InputSource, PbfReader, Pipeline, PipelineConfig, PipelineError, PipelineMode, PlaceReader,
    PoiFilter, ReadError, SourcePlace, SurveyReader, deduplicate, run_concurrently,
};

pub use kartlag_scorer::{BoostConfig, BoostConfigError, PopularityScorer, load_boost_config};
