//! GeoJSON feature payload and its adapter factory.
//!
//! Recognised feature properties:
//! - `name` and `name:<lang>` for names;
//! - `placeType`, `isoCode`, `parentId`, `countryRef`, `categories`, `valid`;
//! - `stopPlaceType`, `subMode` and `interchangeWeighting` for stop places.
//!
//! Every other property stays reachable through [`PlaceRecord::property`].

use std::collections::BTreeMap;

use geo::{Centroid, Coord, LineString};
use kartlag_core::{
    DEFAULT_COUNTRY_REF, GeometryError, InterchangeWeighting, PlaceGeometry, PlaceType,
    StopPlaceType, SubMode, geometry::validated_polygon,
};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{PlaceRecord, PropertyValue, push_unique};

/// A GeoJSON `Feature` as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoJsonFeature {
    /// GeoJSON object type; only `"Feature"` is adapted.
    #[serde(rename = "type")]
    pub kind: String,
    /// Feature id (string or number).
    #[serde(default)]
    pub id: Option<Value>,
    /// Geometry object, `null` when absent.
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Feature properties.
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// How features from one input are labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoJsonOptions {
    /// Source label placed on every record.
    pub source: String,
    /// Place type used when a feature has no `placeType` property.
    pub place_type: PlaceType,
}

impl Default for GeoJsonOptions {
    fn default() -> Self {
        Self {
            source: "geojson".to_owned(),
            place_type: PlaceType::Poi,
        }
    }
}

/// An adapted GeoJSON feature.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonPlace {
    id: String,
    source: String,
    place_type: PlaceType,
    properties: Map<String, Value>,
    geometry: Option<PlaceGeometry>,
    stop_place_type: Option<StopPlaceType>,
    sub_mode: Option<SubMode>,
    interchange: Option<InterchangeWeighting>,
}

impl GeoJsonPlace {
    /// Adapt a feature.
    ///
    /// Returns `None` when the object is not a `Feature`, carries no id (as
    /// the feature `id` member or an `id` property) or names an unknown
    /// `placeType`. Malformed geometry does not reject the feature; the
    /// record simply has no geometry.
    ///
    /// # Examples
    /// ```
    /// use kartlag_core::PlaceType;
    /// use kartlag_data::{GeoJsonFeature, GeoJsonOptions, GeoJsonPlace, PlaceRecord};
    ///
    /// let feature: GeoJsonFeature = serde_json::from_str(r#"{
    ///     "type": "Feature",
    ///     "id": "0301",
    ///     "geometry": {"type": "Point", "coordinates": [10.75, 59.91]},
    ///     "properties": {"name": "Oslo", "placeType": "locality"}
    /// }"#)?;
    /// let place = GeoJsonPlace::from_feature(feature, &GeoJsonOptions::default())
    ///     .expect("feature has an id");
    /// assert_eq!(place.place_type(), PlaceType::Locality);
    /// assert_eq!(place.name(), Some("Oslo"));
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    #[must_use]
    pub fn from_feature(feature: GeoJsonFeature, options: &GeoJsonOptions) -> Option<Self> {
        if feature.kind != "Feature" {
            warn!("Skipped GeoJSON object of type {:?}", feature.kind);
            return None;
        }
        let properties = feature.properties.unwrap_or_default();
        let Some(id) = feature
            .id
            .as_ref()
            .or_else(|| properties.get("id"))
            .and_then(id_text)
        else {
            warn!("Skipped GeoJSON feature without an id");
            return None;
        };
        let place_type = match properties.get("placeType").and_then(Value::as_str) {
            Some(text) => match text.parse::<PlaceType>() {
                Ok(place_type) => place_type,
                Err(err) => {
                    warn!("Skipped GeoJSON feature {id}: {err}");
                    return None;
                }
            },
            None => options.place_type,
        };
        let geometry = feature
            .geometry
            .as_ref()
            .filter(|value| !value.is_null())
            .and_then(|value| match geometry_from_value(value) {
                Ok(geometry) => geometry,
                Err(err) => {
                    debug!("GeoJSON feature {id} has unusable geometry: {err}");
                    None
                }
            });
        Some(Self {
            stop_place_type: vocabulary_property(&properties, "stopPlaceType", &id),
            sub_mode: vocabulary_property(&properties, "subMode", &id),
            interchange: vocabulary_property(&properties, "interchangeWeighting", &id),
            id,
            source: options.source.clone(),
            place_type,
            properties,
            geometry,
        })
    }

    /// Raw feature properties.
    #[must_use]
    pub const fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

impl PlaceRecord for GeoJsonPlace {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn place_type(&self) -> PlaceType {
        self.place_type
    }

    fn name(&self) -> Option<&str> {
        self.text("name").filter(|name| !name.trim().is_empty())
    }

    fn alternative_names(&self) -> BTreeMap<String, String> {
        self.properties
            .iter()
            .filter_map(|(key, value)| {
                let language = key.strip_prefix("name:").filter(|tag| !tag.is_empty())?;
                value
                    .as_str()
                    .map(|name| (language.to_owned(), name.to_owned()))
            })
            .collect()
    }

    fn iso_code(&self) -> Option<&str> {
        self.text("isoCode")
    }

    fn parent_id(&self) -> Option<&str> {
        self.text("parentId")
    }

    fn country_ref(&self) -> &str {
        self.text("countryRef").unwrap_or(DEFAULT_COUNTRY_REF)
    }

    fn categories(&self) -> Vec<String> {
        let mut categories = Vec::new();
        match self.properties.get("categories") {
            Some(Value::Array(values)) => {
                for value in values.iter().filter_map(Value::as_str) {
                    push_unique(&mut categories, value.to_owned());
                }
            }
            Some(Value::String(value)) => categories.push(value.clone()),
            _ => {}
        }
        categories
    }

    fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.properties.get("valid") != Some(&Value::Bool(false))
    }

    fn default_geometry(&self) -> Option<&PlaceGeometry> {
        self.geometry.as_ref()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        if name == "id" {
            return Some(PropertyValue::Text(self.id.clone()));
        }
        self.properties.get(name).and_then(PropertyValue::from_json)
    }

    fn stop_place_type(&self) -> Option<StopPlaceType> {
        self.stop_place_type
    }

    fn sub_mode(&self) -> Option<SubMode> {
        self.sub_mode
    }

    fn interchange_weighting(&self) -> Option<InterchangeWeighting> {
        self.interchange
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn vocabulary_property<T>(properties: &Map<String, Value>, key: &str, id: &str) -> Option<T>
where
    T: std::str::FromStr<Err = kartlag_core::UnknownValueError>,
{
    let text = properties.get(key)?.as_str()?;
    text.parse()
        .map_err(|err| debug!("Ignored {key} on GeoJSON feature {id}: {err}"))
        .ok()
}

/// Convert a GeoJSON geometry object.
///
/// Points and areas convert directly; a `LineString` collapses to its
/// centroid. Other geometry types, and structurally malformed coordinates,
/// yield `Ok(None)`.
pub(crate) fn geometry_from_value(value: &Value) -> Result<Option<PlaceGeometry>, GeometryError> {
    let coordinates = value.get("coordinates");
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Ok(None);
    };
    match (kind, coordinates) {
        ("Point", Some(position)) => match coord_of(position) {
            Some(coord) => PlaceGeometry::point(coord.x, coord.y).map(Some),
            None => Ok(None),
        },
        ("LineString", Some(positions)) => {
            let Some(coords) = ring_of(positions) else {
                return Ok(None);
            };
            match LineString::new(coords).centroid() {
                Some(center) => PlaceGeometry::point(center.x(), center.y()).map(Some),
                None => Ok(None),
            }
        }
        ("Polygon", Some(rings)) => match rings_of(rings) {
            Some(rings) => polygon_from_rings(rings).map(PlaceGeometry::Polygon).map(Some),
            None => Ok(None),
        },
        ("MultiPolygon", Some(Value::Array(members))) => {
            let mut polygons = Vec::with_capacity(members.len());
            for member in members {
                let Some(rings) = rings_of(member) else {
                    return Ok(None);
                };
                polygons.push(polygon_from_rings(rings)?);
            }
            PlaceGeometry::multi_polygon(polygons).map(Some)
        }
        _ => Ok(None),
    }
}

fn polygon_from_rings(
    mut rings: Vec<Vec<Coord<f64>>>,
) -> Result<geo::Polygon<f64>, GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyRing);
    }
    let exterior = rings.remove(0);
    validated_polygon(exterior, rings)
}

fn coord_of(position: &Value) -> Option<Coord<f64>> {
    let values = position.as_array()?;
    let x = values.first()?.as_f64()?;
    let y = values.get(1)?.as_f64()?;
    Some(Coord { x, y })
}

fn ring_of(positions: &Value) -> Option<Vec<Coord<f64>>> {
    positions.as_array()?.iter().map(coord_of).collect()
}

fn rings_of(rings: &Value) -> Option<Vec<Vec<Coord<f64>>>> {
    rings.as_array()?.iter().map(ring_of).collect()
}
