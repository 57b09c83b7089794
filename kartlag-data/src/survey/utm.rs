//! Survey coordinate systems and the UTM to WGS84 conversion.
//!
//! EUREF89 UTM coordinates are converted with the inverse transverse
//! Mercator series on the GRS80 ellipsoid, which matches WGS84 well below
//! a metre for indexing purposes.

use geo::Coord;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const GEOGRAPHIC_KOORDSYS: u32 = 84;

/// How grid values map onto the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Projection {
    /// EUREF89 UTM, northern hemisphere.
    Utm { zone: u8 },
    /// Latitude and longitude in degrees.
    Geographic,
}

impl Projection {
    /// Map a `KOORDSYS` code; EUREF89 UTM codes 21 to 26 cover zones 31 to 36.
    pub(super) fn from_koordsys(code: u32) -> Option<Self> {
        match code {
            21..=26 => u8::try_from(code + 10).ok().map(|zone| Self::Utm { zone }),
            GEOGRAPHIC_KOORDSYS => Some(Self::Geographic),
            _ => None,
        }
    }
}

/// Grid parameters read from a file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct CoordinateSystem {
    pub(super) projection: Projection,
    pub(super) unit: f64,
    pub(super) origin_north: f64,
    pub(super) origin_east: f64,
}

impl CoordinateSystem {
    /// Read `KOORDSYS`, `ENHET` and `ORIGO-NØ` from header attributes.
    ///
    /// `ENHET` defaults to 1 and `ORIGO-NØ` to the grid origin.
    pub(super) fn from_header(attributes: &[(String, String)]) -> Result<Self, String> {
        let code = header_value(attributes, "KOORDSYS")
            .ok_or_else(|| "header has no KOORDSYS".to_owned())?;
        let projection = code
            .parse::<u32>()
            .ok()
            .and_then(Projection::from_koordsys)
            .ok_or_else(|| format!("unsupported KOORDSYS {code}"))?;
        let unit = match header_value(attributes, "ENHET") {
            None => 1.0,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|unit| unit.is_finite() && *unit > 0.0)
                .ok_or_else(|| format!("invalid ENHET {raw}"))?,
        };
        let (origin_north, origin_east) = match header_value(attributes, "ORIGO-NØ") {
            None => (0.0, 0.0),
            Some(raw) => parse_pair(raw).ok_or_else(|| format!("invalid ORIGO-NØ {raw}"))?,
        };
        Ok(Self {
            projection,
            unit,
            origin_north,
            origin_east,
        })
    }

    /// Convert raw grid values to WGS84 (`x = longitude`, `y = latitude`).
    pub(super) fn to_wgs84(&self, north: f64, east: f64) -> Coord<f64> {
        let north = self.origin_north + north * self.unit;
        let east = self.origin_east + east * self.unit;
        match self.projection {
            Projection::Geographic => Coord { x: east, y: north },
            Projection::Utm { zone } => utm_to_wgs84(zone, east, north),
        }
    }
}

fn header_value<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(path, _)| path.rsplit('.').next() == Some(name))
        .map(|(_, value)| value.as_str())
}

fn parse_pair(raw: &str) -> Option<(f64, f64)> {
    let mut values = raw.split_whitespace().map(str::parse::<f64>);
    match (values.next(), values.next(), values.next()) {
        (Some(Ok(first)), Some(Ok(second)), None) => Some((first, second)),
        _ => None,
    }
}

/// Inverse transverse Mercator for a northern-hemisphere UTM zone.
pub(super) fn utm_to_wgs84(zone: u8, easting: f64, northing: f64) -> Coord<f64> {
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);
    let central_meridian = (f64::from(zone) * 6.0 - 183.0).to_radians();

    let x = easting - FALSE_EASTING;
    let meridian_arc = northing / SCALE_FACTOR;
    let mu = meridian_arc / (SEMI_MAJOR_AXIS * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let root = (1.0 - e2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = sin_phi1 / cos_phi1;
    let c1 = ep2 * cos_phi1.powi(2);
    let t1 = tan_phi1.powi(2);
    let denominator = 1.0 - e2 * sin_phi1.powi(2);
    let n1 = SEMI_MAJOR_AXIS / denominator.sqrt();
    let r1 = SEMI_MAJOR_AXIS * (1.0 - e2) / denominator.powf(1.5);
    let d = x / (n1 * SCALE_FACTOR);

    let latitude = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);
    let longitude = central_meridian
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Coord {
        x: longitude.to_degrees(),
        y: latitude.to_degrees(),
    }
}
