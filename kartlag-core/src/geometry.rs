//! Validated place geometries.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`. Readers
//! build geometries through the constructors here so that degenerate input
//! (empty rings, zero-area polygons, out-of-range coordinates) surfaces as a
//! [`GeometryError`] the reader can tally, rather than as a panic later on.

use geo::{Area, Centroid, Coord, LineString, MultiPolygon, Point, Polygon};
use serde_json::{Value, json};
use thiserror::Error;

/// Reasons a geometry was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A coordinate was not finite or fell outside WGS84 bounds.
    #[error("coordinate ({lon}, {lat}) is outside WGS84 bounds")]
    InvalidCoordinate {
        /// Longitude as supplied.
        lon: f64,
        /// Latitude as supplied.
        lat: f64,
    },
    /// A ring contained no coordinates.
    #[error("ring is empty")]
    EmptyRing,
    /// A closed ring had fewer than four coordinates.
    #[error("ring has {count} coordinates, at least 4 are required")]
    TooFewCoordinates {
        /// Number of coordinates after closing the ring.
        count: usize,
    },
    /// The polygon encloses no area.
    #[error("polygon is degenerate (zero area)")]
    Degenerate,
    /// A multipolygon contained no polygons.
    #[error("multipolygon has no members")]
    EmptyMultiPolygon,
}

/// Geometry attached to a place.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceGeometry {
    /// A single position.
    Point(Point<f64>),
    /// An area with one exterior ring.
    Polygon(Polygon<f64>),
    /// An area made of several disjoint polygons.
    MultiPolygon(MultiPolygon<f64>),
}

impl PlaceGeometry {
    /// Build a validated point.
    ///
    /// # Examples
    /// ```
    /// use kartlag_core::PlaceGeometry;
    ///
    /// let oslo = PlaceGeometry::point(10.75, 59.91)?;
    /// assert!(!oslo.has_shape());
    /// assert!(PlaceGeometry::point(10.75, 91.0).is_err());
    /// # Ok::<(), kartlag_core::GeometryError>(())
    /// ```
    pub fn point(lon: f64, lat: f64) -> Result<Self, GeometryError> {
        validated_coord(lon, lat).map(|coord| Self::Point(Point::from(coord)))
    }

    /// Build a validated polygon from an exterior ring and optional holes.
    ///
    /// Open rings are closed automatically.
    pub fn polygon(
        exterior: Vec<Coord<f64>>,
        interiors: Vec<Vec<Coord<f64>>>,
    ) -> Result<Self, GeometryError> {
        validated_polygon(exterior, interiors).map(Self::Polygon)
    }

    /// Build a validated multipolygon from already-validated polygons.
    ///
    /// A single member collapses to [`PlaceGeometry::Polygon`].
    pub fn multi_polygon(mut polygons: Vec<Polygon<f64>>) -> Result<Self, GeometryError> {
        match polygons.len() {
            0 => Err(GeometryError::EmptyMultiPolygon),
            1 => polygons
                .pop()
                .map(Self::Polygon)
                .ok_or(GeometryError::EmptyMultiPolygon),
            _ => Ok(Self::MultiPolygon(MultiPolygon::new(polygons))),
        }
    }

    /// Report whether the geometry carries an area shape.
    #[must_use]
    pub const fn has_shape(&self) -> bool {
        !matches!(self, Self::Point(_))
    }

    /// The point used as the place's center: the point itself or the area centroid.
    #[must_use]
    pub fn representative_point(&self) -> Option<Point<f64>> {
        match self {
            Self::Point(point) => Some(*point),
            Self::Polygon(polygon) => polygon.centroid(),
            Self::MultiPolygon(polygons) => polygons.centroid(),
        }
    }

    /// Encode the geometry as a GeoJSON geometry object.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        match self {
            Self::Point(point) => json!({
                "type": "Point",
                "coordinates": [point.x(), point.y()],
            }),
            Self::Polygon(polygon) => json!({
                "type": "Polygon",
                "coordinates": polygon_coordinates(polygon),
            }),
            Self::MultiPolygon(polygons) => json!({
                "type": "MultiPolygon",
                "coordinates": polygons.iter().map(polygon_coordinates).collect::<Vec<_>>(),
            }),
        }
    }
}

/// Validate a WGS84 coordinate pair.
pub fn validated_coord(lon: f64, lat: f64) -> Result<Coord<f64>, GeometryError> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
    .ok_or(GeometryError::InvalidCoordinate { lon, lat })
}

/// Validate and assemble a polygon; exposed for readers that build multipolygons.
pub fn validated_polygon(
    exterior: Vec<Coord<f64>>,
    interiors: Vec<Vec<Coord<f64>>>,
) -> Result<Polygon<f64>, GeometryError> {
    let exterior = validated_ring(exterior)?;
    let interiors = interiors
        .into_iter()
        .map(validated_ring)
        .collect::<Result<Vec<_>, _>>()?;
    let polygon = Polygon::new(exterior, interiors);
    if polygon.unsigned_area() > 0.0 {
        Ok(polygon)
    } else {
        Err(GeometryError::Degenerate)
    }
}

fn validated_ring(mut coords: Vec<Coord<f64>>) -> Result<LineString<f64>, GeometryError> {
    let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) else {
        return Err(GeometryError::EmptyRing);
    };
    for coord in &coords {
        validated_coord(coord.x, coord.y)?;
    }
    if first != last {
        coords.push(first);
    }
    if coords.len() < 4 {
        return Err(GeometryError::TooFewCoordinates {
            count: coords.len(),
        });
    }
    Ok(LineString::new(coords))
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|coord| [coord.x, coord.y]).collect())
        .collect()
}
