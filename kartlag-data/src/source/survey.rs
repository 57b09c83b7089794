//! SOSI survey object payload.
//!
//! Attributes are kept as `(path, value)` pairs in file order, where the path
//! joins the dotted group names below the object (`STEDSNAVN.SPRÅK`,
//! `IDENT.LOKALID`, ...). Derived accessors read well-known paths.

use std::collections::BTreeMap;
use std::fmt;

use kartlag_core::{DEFAULT_COUNTRY_REF, PlaceGeometry, PlaceType};

use super::{PlaceRecord, PropertyValue};

/// Source label for survey records.
pub(crate) const SURVEY_SOURCE: &str = "kartverket";

const ID_PATHS: [&str; 4] = ["STEDSNUMMER", "KOMMUNENUMMER", "FYLKESNUMMER", "IDENT.LOKALID"];
const PRIMARY_LANGUAGE: &str = "nor";

/// Object kinds a survey file can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurveyObjectKind {
    /// `.PUNKT`
    Point,
    /// `.TEKST`
    Text,
    /// `.KURVE`
    Curve,
    /// `.FLATE`
    Surface,
}

impl SurveyObjectKind {
    /// Parse an object keyword without its leading dot.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "PUNKT" => Some(Self::Point),
            "TEKST" => Some(Self::Text),
            "KURVE" => Some(Self::Curve),
            "FLATE" => Some(Self::Surface),
            _ => None,
        }
    }
}

impl fmt::Display for SurveyObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "PUNKT",
            Self::Text => "TEKST",
            Self::Curve => "KURVE",
            Self::Surface => "FLATE",
        })
    }
}

/// A survey object adapted to the place record view.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyPlace {
    kind: SurveyObjectKind,
    serial: u64,
    id: String,
    place_type: PlaceType,
    attributes: Vec<(String, String)>,
    name: Option<String>,
    alternative_names: BTreeMap<String, String>,
    parent_id: Option<String>,
    iso_code: Option<String>,
    geometry: Option<PlaceGeometry>,
}

impl SurveyPlace {
    /// Build a record from a finished object.
    #[must_use]
    pub fn new(
        kind: SurveyObjectKind,
        serial: u64,
        attributes: Vec<(String, String)>,
        geometry: Option<PlaceGeometry>,
    ) -> Self {
        let id = ID_PATHS
            .iter()
            .find_map(|path| exact(&attributes, path))
            .map_or_else(|| serial.to_string(), str::to_owned);
        let place_type = exact(&attributes, "OBJTYPE").map_or(PlaceType::PlaceName, place_type_of);
        let (name, alternative_names) = names_of(&attributes);
        let parent_id = parent_of(place_type, &attributes);
        let iso_code = (place_type == PlaceType::County)
            .then(|| exact(&attributes, "FYLKESNUMMER"))
            .flatten()
            .map(|number| format!("NO-{number}"));
        Self {
            kind,
            serial,
            id,
            place_type,
            attributes,
            name,
            alternative_names,
            parent_id,
            iso_code,
            geometry,
        }
    }

    /// Object kind.
    #[must_use]
    pub const fn kind(&self) -> SurveyObjectKind {
        self.kind
    }

    /// Object serial number within its file.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// First value stored under `path`, or under a path ending in `path`.
    #[must_use]
    pub fn attribute(&self, path: &str) -> Option<&str> {
        exact(&self.attributes, path).or_else(|| {
            self.attributes
                .iter()
                .find(|(key, _)| key.rsplit('.').next() == Some(path))
                .map(|(_, value)| value.as_str())
        })
    }
}

impl PlaceRecord for SurveyPlace {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        SURVEY_SOURCE
    }

    fn place_type(&self) -> PlaceType {
        self.place_type
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn alternative_names(&self) -> BTreeMap<String, String> {
        self.alternative_names.clone()
    }

    fn iso_code(&self) -> Option<&str> {
        self.iso_code.as_deref()
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn country_ref(&self) -> &str {
        self.attribute("LANDKODE").unwrap_or(DEFAULT_COUNTRY_REF)
    }

    fn categories(&self) -> Vec<String> {
        exact(&self.attributes, "OBJTYPE")
            .map(|objtype| vec![objtype.to_owned()])
            .unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.kind != SurveyObjectKind::Curve && exact(&self.attributes, "OBJTYPE").is_some()
    }

    fn default_geometry(&self) -> Option<&PlaceGeometry> {
        self.geometry.as_ref()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.attribute(name).map(PropertyValue::from_text)
    }
}

fn exact<'a>(attributes: &'a [(String, String)], path: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == path)
        .map(|(_, value)| value.as_str())
}

fn place_type_of(objtype: &str) -> PlaceType {
    match objtype {
        "Fylke" => PlaceType::County,
        "Kommune" => PlaceType::Locality,
        "Bydel" => PlaceType::Borough,
        "Land" | "Naboland" => PlaceType::NeighbouringCountry,
        _ => PlaceType::PlaceName,
    }
}

/// Scan names in file order; a `SPRÅK` attribute sets the language of the names after it.
fn names_of(attributes: &[(String, String)]) -> (Option<String>, BTreeMap<String, String>) {
    let mut language: Option<&str> = None;
    let mut named: Vec<(Option<&str>, &str)> = Vec::new();
    for (path, value) in attributes {
        let leaf = path.rsplit('.').next().unwrap_or(path.as_str());
        match leaf {
            "SPRÅK" => language = Some(value.as_str()),
            "NAVN" | "LANGNAVN" if !value.trim().is_empty() => {
                named.push((language, value.as_str()));
            }
            _ => {}
        }
    }
    let primary = named
        .iter()
        .position(|(tag, _)| tag.is_none_or(|tag| tag == PRIMARY_LANGUAGE))
        .or_else(|| (!named.is_empty()).then_some(0));
    let default = primary
        .and_then(|index| named.get(index))
        .map(|(_, name)| (*name).to_owned());
    let mut alternatives = BTreeMap::new();
    for (index, (tag, name)) in named.iter().enumerate() {
        if Some(index) == primary {
            continue;
        }
        if let Some(tag) = tag {
            alternatives
                .entry((*tag).to_owned())
                .or_insert_with(|| (*name).to_owned());
        }
    }
    (default, alternatives)
}

fn parent_of(place_type: PlaceType, attributes: &[(String, String)]) -> Option<String> {
    match place_type {
        PlaceType::County | PlaceType::NeighbouringCountry => None,
        PlaceType::Locality => exact(attributes, "FYLKESNUMMER")
            .map(str::to_owned)
            .or_else(|| {
                exact(attributes, "KOMMUNENUMMER")
                    .and_then(|number| number.get(..2))
                    .map(str::to_owned)
            }),
        _ => exact(attributes, "KOMM")
            .or_else(|| exact(attributes, "KOMMUNENUMMER"))
            .map(str::to_owned),
    }
}
