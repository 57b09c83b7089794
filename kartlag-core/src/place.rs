//! The canonical place every source record is normalised into.

use std::collections::BTreeMap;

use geo::Point;

use crate::geometry::PlaceGeometry;
use crate::stop::{InterchangeWeighting, StopMode};

/// Country assumed when a source does not state one (ISO 3166-1 alpha-3).
pub const DEFAULT_COUNTRY_REF: &str = "NOR";

vocabulary! {
    /// Categorical type of a canonical place.
    pub enum PlaceType {
        County => "county",
        Locality => "locality",
        Borough => "borough",
        Poi => "poi",
        StopPlace => "stopPlace",
        PlaceName => "placeName",
        Address => "address",
        NeighbouringCountry => "neighbouringCountry",
    }
}

impl PlaceType {
    /// The parent slot children of a place of this type link into.
    #[must_use]
    pub const fn child_parent_slot(self) -> Option<ParentSlot> {
        match self {
            Self::NeighbouringCountry => Some(ParentSlot::Country),
            Self::County => Some(ParentSlot::County),
            Self::Locality => Some(ParentSlot::Locality),
            Self::Borough => Some(ParentSlot::Borough),
            Self::StopPlace => Some(ParentSlot::StopPlace),
            Self::Poi | Self::PlaceName | Self::Address => None,
        }
    }
}

/// Default name plus alternative names keyed by language tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceNames {
    /// Primary name, if the source supplied one.
    pub default: Option<String>,
    /// Localised names keyed by language tag (`"en"`, `"se"`, ...).
    pub alternatives: BTreeMap<String, String>,
}

impl PlaceNames {
    /// Construct names from a primary name and localised alternatives.
    #[must_use]
    pub const fn new(default: Option<String>, alternatives: BTreeMap<String, String>) -> Self {
        Self {
            default,
            alternatives,
        }
    }
}

/// Which ancestor a parent identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentSlot {
    /// Containing country.
    Country,
    /// Containing county.
    County,
    /// Containing municipality.
    Locality,
    /// Containing borough.
    Borough,
    /// Multimodal parent stop place.
    StopPlace,
}

/// Identifiers of a place's ancestors. Never live references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParentRefs {
    /// Country identifier.
    pub country_id: Option<String>,
    /// County identifier.
    pub county_id: Option<String>,
    /// Municipality identifier.
    pub locality_id: Option<String>,
    /// Borough identifier.
    pub borough_id: Option<String>,
    /// Parent stop place identifier.
    pub stop_place_id: Option<String>,
}

impl ParentRefs {
    /// Record `id` in `slot`, replacing any previous value.
    pub fn set(&mut self, slot: ParentSlot, id: impl Into<String>) {
        let target = match slot {
            ParentSlot::Country => &mut self.country_id,
            ParentSlot::County => &mut self.county_id,
            ParentSlot::Locality => &mut self.locality_id,
            ParentSlot::Borough => &mut self.borough_id,
            ParentSlot::StopPlace => &mut self.stop_place_id,
        };
        *target = Some(id.into());
    }

    /// Look up the identifier stored in `slot`.
    #[must_use]
    pub fn get(&self, slot: ParentSlot) -> Option<&str> {
        match slot {
            ParentSlot::Country => self.country_id.as_deref(),
            ParentSlot::County => self.county_id.as_deref(),
            ParentSlot::Locality => self.locality_id.as_deref(),
            ParentSlot::Borough => self.borough_id.as_deref(),
            ParentSlot::StopPlace => self.stop_place_id.as_deref(),
        }
    }
}

/// Scoring inputs carried by stop places.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StopAttributes {
    /// The stop's own mode followed by the modes of any child stops.
    pub modes: Vec<StopMode>,
    /// Interchange importance, if registered.
    pub interchange: Option<InterchangeWeighting>,
}

/// A normalised place ready for scoring and emission.
///
/// # Examples
/// ```
/// use kartlag_core::{CanonicalPlace, PlaceGeometry, PlaceType};
///
/// let mut place = CanonicalPlace::new("NSR:StopPlace:337", "nsr", PlaceType::StopPlace);
/// place.geometry = Some(PlaceGeometry::point(10.752, 59.911)?);
/// let scored = place.with_popularity(60_000);
///
/// assert_eq!(scored.popularity, Some(60_000));
/// assert_eq!(scored.country_ref, "NOR");
/// # Ok::<(), kartlag_core::GeometryError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPlace {
    /// Stable identifier within the source.
    pub id: String,
    /// Label of the source dataset (`"openstreetmap"`, `"kartverket"`, ...).
    pub source: String,
    /// Categorical place type.
    pub place_type: PlaceType,
    /// Default and localised names.
    pub names: PlaceNames,
    /// Category tags in first-seen order without duplicates.
    pub categories: Vec<String>,
    /// Ancestor identifiers.
    pub parent: ParentRefs,
    /// Geometry, absent when the source geometry was unusable.
    pub geometry: Option<PlaceGeometry>,
    /// ISO 3166-1 alpha-3 country code.
    pub country_ref: String,
    /// Source ISO code (e.g. county or country code), if any.
    pub iso_code: Option<String>,
    /// Stop scoring inputs, present for stop places.
    pub stop: Option<StopAttributes>,
    /// Set when the source lacked a primary name.
    pub low_quality: bool,
    /// Popularity score, `None` until scored.
    pub popularity: Option<i64>,
}

impl CanonicalPlace {
    /// Start a place with the default country and no optional data.
    pub fn new(id: impl Into<String>, source: impl Into<String>, place_type: PlaceType) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            place_type,
            names: PlaceNames::default(),
            categories: Vec::new(),
            parent: ParentRefs::default(),
            geometry: None,
            country_ref: DEFAULT_COUNTRY_REF.to_owned(),
            iso_code: None,
            stop: None,
            low_quality: false,
            popularity: None,
        }
    }

    /// Append a category unless it is already present.
    pub fn push_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }

    /// Return the place with its popularity set.
    #[must_use]
    pub fn with_popularity(self, popularity: i64) -> Self {
        Self {
            popularity: Some(popularity),
            ..self
        }
    }

    /// Representative point of the geometry, if any.
    #[must_use]
    pub fn center(&self) -> Option<Point<f64>> {
        self.geometry
            .as_ref()
            .and_then(PlaceGeometry::representative_point)
    }
}
