//! Uniform view over records produced by the format readers.
//!
//! Each format keeps its own payload type ([`OsmPlace`], [`GeoJsonPlace`],
//! [`SurveyPlace`]); [`SourcePlace`] tags them and forwards the
//! [`PlaceRecord`] accessors so downstream stages never branch on format.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use kartlag_core::{InterchangeWeighting, PlaceGeometry, PlaceType, StopPlaceType, SubMode};
use serde_json::Value;

mod geojson;
mod osm;
mod survey;

pub use geojson::{GeoJsonFeature, GeoJsonOptions, GeoJsonPlace};
pub use osm::{OsmElementRef, OsmPlace};
pub use survey::{SurveyObjectKind, SurveyPlace};

/// Input formats understood by the readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// OpenStreetMap protobuf extract.
    Pbf,
    /// One GeoJSON `Feature` per file.
    SingleGeoJson,
    /// A GeoJSON `FeatureCollection`.
    MultiGeoJson,
    /// SOSI survey text.
    SurveyText,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pbf => "pbf",
            Self::SingleGeoJson => "geojson",
            Self::MultiGeoJson => "geojson-collection",
            Self::SurveyText => "sosi",
        })
    }
}

/// Scalar value of a named source property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Free text.
    Text(String),
    /// Any numeric value.
    Number(f64),
    /// A boolean flag.
    Bool(bool),
}

impl PropertyValue {
    /// Interpret raw text, preferring a number when the text is numeric.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map_or_else(|| Self::Text(raw.to_owned()), Self::Number)
    }

    /// Convert a scalar JSON value; arrays, objects and `null` have no property value.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Order two values of the same kind; values of different kinds are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(lhs), Self::Number(rhs)) => lhs.partial_cmp(rhs),
            (Self::Text(lhs), Self::Text(rhs)) => Some(lhs.cmp(rhs)),
            (Self::Bool(lhs), Self::Bool(rhs)) => Some(lhs.cmp(rhs)),
            _ => None,
        }
    }

    /// Borrow the text of a [`PropertyValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) | Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

/// Normalised accessors every source record exposes.
pub trait PlaceRecord {
    /// Stable identifier within the source.
    fn id(&self) -> &str;

    /// Label of the source the record came from.
    fn source(&self) -> &str;

    /// Canonical type the record maps to.
    fn place_type(&self) -> PlaceType;

    /// Primary name.
    fn name(&self) -> Option<&str>;

    /// Localised names keyed by language tag.
    fn alternative_names(&self) -> BTreeMap<String, String>;

    /// ISO 3166-2 subdivision code.
    fn iso_code(&self) -> Option<&str>;

    /// Identifier of the parent record, if the source states one.
    fn parent_id(&self) -> Option<&str>;

    /// ISO 3166-1 alpha-3 country code; defaults to `"NOR"`.
    fn country_ref(&self) -> &str;

    /// Category tags without duplicates, in first-seen order.
    fn categories(&self) -> Vec<String>;

    /// Whether the record should be mapped at all.
    fn is_valid(&self) -> bool;

    /// Geometry, or `None` when missing or unusable.
    fn default_geometry(&self) -> Option<&PlaceGeometry>;

    /// Look up an arbitrary named property.
    fn property(&self, name: &str) -> Option<PropertyValue>;

    /// Physical stop type, for stop places.
    fn stop_place_type(&self) -> Option<StopPlaceType> {
        None
    }

    /// Transport sub-mode, for stop places.
    fn sub_mode(&self) -> Option<SubMode> {
        None
    }

    /// Interchange weighting, for stop places.
    fn interchange_weighting(&self) -> Option<InterchangeWeighting> {
        None
    }
}

/// A record from any supported format.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePlace {
    /// Node, way or relation from a PBF extract.
    Osm(OsmPlace),
    /// Feature from a GeoJSON file.
    GeoJson(GeoJsonPlace),
    /// Object from a SOSI survey file.
    Survey(SurveyPlace),
}

impl SourcePlace {
    /// Wrap a GeoJSON feature, returning `None` when the feature cannot be adapted.
    ///
    /// See [`GeoJsonPlace::from_feature`] for the rejection rules.
    #[must_use]
    pub fn from_feature(feature: GeoJsonFeature, options: &GeoJsonOptions) -> Option<Self> {
        GeoJsonPlace::from_feature(feature, options).map(Self::GeoJson)
    }

    fn record(&self) -> &dyn PlaceRecord {
        match self {
            Self::Osm(place) => place,
            Self::GeoJson(place) => place,
            Self::Survey(place) => place,
        }
    }
}

impl PlaceRecord for SourcePlace {
    fn id(&self) -> &str {
        self.record().id()
    }

    fn source(&self) -> &str {
        self.record().source()
    }

    fn place_type(&self) -> PlaceType {
        self.record().place_type()
    }

    fn name(&self) -> Option<&str> {
        self.record().name()
    }

    fn alternative_names(&self) -> BTreeMap<String, String> {
        self.record().alternative_names()
    }

    fn iso_code(&self) -> Option<&str> {
        self.record().iso_code()
    }

    fn parent_id(&self) -> Option<&str> {
        self.record().parent_id()
    }

    fn country_ref(&self) -> &str {
        self.record().country_ref()
    }

    fn categories(&self) -> Vec<String> {
        self.record().categories()
    }

    fn is_valid(&self) -> bool {
        self.record().is_valid()
    }

    fn default_geometry(&self) -> Option<&PlaceGeometry> {
        self.record().default_geometry()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.record().property(name)
    }

    fn stop_place_type(&self) -> Option<StopPlaceType> {
        self.record().stop_place_type()
    }

    fn sub_mode(&self) -> Option<SubMode> {
        self.record().sub_mode()
    }

    fn interchange_weighting(&self) -> Option<InterchangeWeighting> {
        self.record().interchange_weighting()
    }
}

/// Push `value` unless already present, keeping first-seen order.
fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

#[cfg(test)]
mod tests;
