//! Core domain types for the Kartlag place indexer.
//!
//! The crate holds the canonical place model every source format is mapped
//! into, the geometry validation shared by all readers, and the index
//! documents and bulk commands emitted for the search index.
//!
//! Invariants:
//! - Canonical places link to their parents by identifier only.
//! - Geometry constructors reject degenerate input instead of panicking.
//! - Documents serialize with the field names the index expects.

#![forbid(unsafe_code)]

#[macro_use]
mod vocabulary;

pub mod bulk;
pub mod document;
pub mod geometry;
pub mod place;
pub mod stop;

pub use bulk::{ActionHeader, BulkWriteError, BulkWriter, IndexCommand, sort_by_popularity, write};
pub use document::{
    CenterPoint, DocumentEmitter, DocumentParent, EmitterConfig, EmitterStats, IndexDocument, Layer,
};
pub use geometry::{GeometryError, PlaceGeometry};
pub use place::{
    CanonicalPlace, DEFAULT_COUNTRY_REF, ParentRefs, ParentSlot, PlaceNames, PlaceType,
    StopAttributes,
};
pub use stop::{InterchangeWeighting, StopMode, StopPlaceType, SubMode};
pub use vocabulary::UnknownValueError;
