//! Index documents derived from canonical places.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::place::{CanonicalPlace, PlaceType};

vocabulary! {
    /// Index layer a document is stored under.
    pub enum Layer {
        Venue => "venue",
        Address => "address",
        Country => "country",
        County => "county",
        Locality => "locality",
        Borough => "borough",
        Neighbourhood => "neighbourhood",
    }
}

impl From<PlaceType> for Layer {
    fn from(place_type: PlaceType) -> Self {
        match place_type {
            PlaceType::County => Self::County,
            PlaceType::Locality => Self::Locality,
            PlaceType::Borough => Self::Borough,
            PlaceType::Poi | PlaceType::StopPlace => Self::Venue,
            PlaceType::PlaceName => Self::Neighbourhood,
            PlaceType::Address => Self::Address,
            PlaceType::NeighbouringCountry => Self::Country,
        }
    }
}

/// Document center in the index's `lat`/`lon` convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CenterPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Ancestor identifiers as stored on the document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DocumentParent {
    /// Country identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_id: Option<String>,
    /// County identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county_id: Option<String>,
    /// Municipality identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality_id: Option<String>,
    /// Borough identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borough_id: Option<String>,
}

impl DocumentParent {
    /// Report whether no ancestor is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.country_id.is_none()
            && self.county_id.is_none()
            && self.locality_id.is_none()
            && self.borough_id.is_none()
    }
}

/// The unit of emission for the search index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDocument {
    /// Index layer.
    pub layer: Layer,
    /// Source dataset label.
    pub source: String,
    /// Identifier within the source.
    pub source_id: String,
    /// Names keyed by `"default"` and language tags.
    pub name: BTreeMap<String, String>,
    /// Document center.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_point: Option<CenterPoint>,
    /// GeoJSON shape for area places.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Value>,
    /// Ancestor identifiers.
    #[serde(skip_serializing_if = "DocumentParent::is_empty")]
    pub parent: DocumentParent,
    /// Category tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    /// Popularity score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<i64>,
}

/// Switches governing which documents a place yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitterConfig {
    /// Keep places without a center as name/category documents.
    pub allow_centerless: bool,
    /// Emit an extra category-match document per POI category.
    pub category_documents: bool,
}

/// Counters gathered while emitting documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitterStats {
    /// Documents produced.
    pub documents: u64,
    /// Places dropped because they had no usable center.
    pub dropped_centerless: u64,
}

/// Converts canonical places into index documents.
#[derive(Debug, Default)]
pub struct DocumentEmitter {
    config: EmitterConfig,
    stats: EmitterStats,
}

impl DocumentEmitter {
    /// Create an emitter with the given switches.
    #[must_use]
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            stats: EmitterStats::default(),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> EmitterStats {
        self.stats
    }

    /// Produce the documents for one place.
    ///
    /// Returns an empty vector when the place has no center and centerless
    /// documents are disabled; the drop is counted.
    ///
    /// # Examples
    /// ```
    /// use kartlag_core::{CanonicalPlace, DocumentEmitter, EmitterConfig, PlaceGeometry, PlaceType};
    ///
    /// let mut place = CanonicalPlace::new("0301", "kartverket", PlaceType::Locality);
    /// place.names.default = Some("Oslo".into());
    /// place.geometry = Some(PlaceGeometry::point(10.75, 59.91)?);
    ///
    /// let mut emitter = DocumentEmitter::new(EmitterConfig::default());
    /// let documents = emitter.to_documents(&place);
    /// assert_eq!(documents.len(), 1);
    /// assert_eq!(documents[0].name["default"], "Oslo");
    /// # Ok::<(), kartlag_core::GeometryError>(())
    /// ```
    pub fn to_documents(&mut self, place: &CanonicalPlace) -> Vec<IndexDocument> {
        let center = place.center().map(|point| CenterPoint {
            lat: point.y(),
            lon: point.x(),
        });
        if center.is_none() && !self.config.allow_centerless {
            debug!("Dropped place {} without a usable center", place.id);
            self.stats.dropped_centerless += 1;
            return Vec::new();
        }

        let primary = primary_document(place, center);
        let mut documents = Vec::with_capacity(1 + place.categories.len());
        if self.config.category_documents && place.place_type == PlaceType::Poi {
            documents.extend(
                place
                    .categories
                    .iter()
                    .map(|category| category_document(&primary, category)),
            );
        }
        documents.insert(0, primary);
        self.stats.documents += documents.len() as u64;
        documents
    }
}

fn primary_document(place: &CanonicalPlace, center: Option<CenterPoint>) -> IndexDocument {
    let mut name = place.names.alternatives.clone();
    if let Some(default) = &place.names.default {
        name.insert("default".to_owned(), default.clone());
    }
    IndexDocument {
        layer: Layer::from(place.place_type),
        source: place.source.clone(),
        source_id: place.id.clone(),
        name,
        center_point: center,
        shape: place
            .geometry
            .as_ref()
            .filter(|geometry| geometry.has_shape())
            .map(|geometry| geometry.to_geojson()),
        parent: DocumentParent {
            country_id: place.parent.country_id.clone(),
            county_id: place.parent.county_id.clone(),
            locality_id: place.parent.locality_id.clone(),
            borough_id: place.parent.borough_id.clone(),
        },
        category: place.categories.clone(),
        popularity: place.popularity,
    }
}

fn category_document(primary: &IndexDocument, category: &str) -> IndexDocument {
    let label = category
        .split_once('=')
        .map_or(category, |(_, value)| value)
        .replace('_', " ");
    IndexDocument {
        source_id: format!("{}:{category}", primary.source_id),
        name: BTreeMap::from([("default".to_owned(), label)]),
        shape: None,
        category: vec![category.to_owned()],
        ..primary.clone()
    }
}
