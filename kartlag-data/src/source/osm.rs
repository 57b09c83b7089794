//! OpenStreetMap payload.

use std::collections::BTreeMap;
use std::fmt;

use kartlag_core::{DEFAULT_COUNTRY_REF, PlaceGeometry, PlaceType};

use super::{PlaceRecord, PropertyValue};

/// Source label for OpenStreetMap records.
pub(crate) const OSM_SOURCE: &str = "openstreetmap";

/// Kind and raw id of the OSM element a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsmElementRef {
    /// A node.
    Node(i64),
    /// A way.
    Way(i64),
    /// A relation.
    Relation(i64),
}

impl fmt::Display for OsmElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node/{id}"),
            Self::Way(id) => write!(f, "way/{id}"),
            Self::Relation(id) => write!(f, "relation/{id}"),
        }
    }
}

/// A filter-matching OSM element with its resolved geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmPlace {
    element: OsmElementRef,
    id: String,
    tags: BTreeMap<String, String>,
    categories: Vec<String>,
    geometry: Option<PlaceGeometry>,
}

impl OsmPlace {
    /// Build a record; `categories` are the `key=value` pairs the POI filter matched.
    #[must_use]
    pub fn new(
        element: OsmElementRef,
        tags: BTreeMap<String, String>,
        categories: Vec<String>,
        geometry: Option<PlaceGeometry>,
    ) -> Self {
        Self {
            element,
            id: element.to_string(),
            tags,
            categories,
            geometry,
        }
    }

    /// The element the record came from.
    #[must_use]
    pub const fn element(&self) -> OsmElementRef {
        self.element
    }

    /// Raw OSM tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

impl PlaceRecord for OsmPlace {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        OSM_SOURCE
    }

    fn place_type(&self) -> PlaceType {
        PlaceType::Poi
    }

    fn name(&self) -> Option<&str> {
        self.tags.get("name").map(String::as_str)
    }

    fn alternative_names(&self) -> BTreeMap<String, String> {
        self.tags
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("name:")
                    .filter(|language| !language.is_empty())
                    .map(|language| (language.to_owned(), value.clone()))
            })
            .collect()
    }

    fn iso_code(&self) -> Option<&str> {
        self.tags.get("ISO3166-2").map(String::as_str)
    }

    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn country_ref(&self) -> &str {
        self.tags
            .get("ISO3166-1:alpha3")
            .map_or(DEFAULT_COUNTRY_REF, String::as_str)
    }

    fn categories(&self) -> Vec<String> {
        self.categories.clone()
    }

    fn is_valid(&self) -> bool {
        !self.categories.is_empty()
    }

    fn default_geometry(&self) -> Option<&PlaceGeometry> {
        self.geometry.as_ref()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.tags
            .get(name)
            .map(|value| PropertyValue::from_text(value))
    }
}
