//! Unit tests for the source record adapters.

use std::collections::BTreeMap;

use kartlag_core::{PlaceGeometry, PlaceType, StopPlaceType, SubMode};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;

fn feature(json: Value) -> GeoJsonFeature {
    serde_json::from_value(json).expect("valid feature")
}

fn adapt(json: Value) -> Option<GeoJsonPlace> {
    GeoJsonPlace::from_feature(feature(json), &GeoJsonOptions::default())
}

fn attributes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(path, value)| ((*path).to_owned(), (*value).to_owned()))
        .collect()
}

#[rstest]
#[case("42", PropertyValue::Number(42.0))]
#[case(" 7.5 ", PropertyValue::Number(7.5))]
#[case("NaN", PropertyValue::Text("NaN".into()))]
#[case("Bryggen", PropertyValue::Text("Bryggen".into()))]
fn property_text_prefers_numbers(#[case] raw: &str, #[case] expected: PropertyValue) {
    assert_eq!(PropertyValue::from_text(raw), expected);
}

#[rstest]
fn property_values_of_different_kinds_do_not_compare() {
    let number = PropertyValue::Number(1.0);
    let text = PropertyValue::Text("1".into());

    assert_eq!(number.compare(&text), None);
    assert_eq!(
        PropertyValue::Number(2.0).compare(&number),
        Some(Ordering::Greater)
    );
    assert_eq!(PropertyValue::from_json(&Value::Null), None);
    assert_eq!(PropertyValue::from_json(&json!([1, 2])), None);
}

#[rstest]
#[case::not_a_feature(json!({ "type": "Point", "id": "1" }))]
#[case::no_id(json!({ "type": "Feature", "properties": { "name": "Anon" } }))]
#[case::blank_id(json!({ "type": "Feature", "id": "  " }))]
#[case::unknown_place_type(json!({ "type": "Feature", "id": "1", "properties": { "placeType": "planet" } }))]
fn features_that_cannot_be_adapted(#[case] json: Value) {
    assert!(adapt(json).is_none());
}

#[rstest]
fn feature_id_falls_back_to_the_id_property() {
    let place = adapt(json!({ "type": "Feature", "properties": { "id": 17 } })).expect("adapted");

    assert_eq!(place.id(), "17");
    assert_eq!(place.place_type(), PlaceType::Poi);
    assert_eq!(place.country_ref(), "NOR");
}

#[rstest]
fn feature_properties_are_exposed() {
    let place = adapt(json!({
        "type": "Feature",
        "id": "NSR:StopPlace:3",
        "properties": {
            "placeType": "stopPlace",
            "name": "Bergen stasjon",
            "name:en": "Bergen Station",
            "name:": "ignored",
            "parentId": null,
            "stopPlaceType": "railStation",
            "subMode": "warpDrive",
            "categories": "station",
        },
    }))
    .expect("adapted");

    assert_eq!(place.place_type(), PlaceType::StopPlace);
    assert_eq!(
        place.alternative_names(),
        BTreeMap::from([("en".to_owned(), "Bergen Station".to_owned())])
    );
    assert_eq!(place.parent_id(), None);
    assert_eq!(place.stop_place_type(), Some(StopPlaceType::RailStation));
    assert_eq!(place.sub_mode(), None::<SubMode>);
    assert_eq!(place.categories(), ["station"]);
    assert_eq!(
        place.property("id"),
        Some(PropertyValue::Text("NSR:StopPlace:3".into()))
    );
}

#[rstest]
fn line_strings_collapse_to_their_centroid() {
    let place = adapt(json!({
        "type": "Feature",
        "id": "road",
        "geometry": { "type": "LineString", "coordinates": [[10.0, 60.0], [10.2, 60.0]] },
    }))
    .expect("adapted");

    let Some(PlaceGeometry::Point(point)) = place.default_geometry() else {
        panic!("expected a point, got {:?}", place.default_geometry());
    };
    assert!((point.x() - 10.1).abs() < 1e-9);
    assert!((point.y() - 60.0).abs() < 1e-9);
}

#[rstest]
#[case::degenerate(json!({ "type": "Polygon", "coordinates": [[[0, 0], [1, 1], [2, 2], [0, 0]]] }))]
#[case::out_of_range(json!({ "type": "Point", "coordinates": [200.0, 10.0] }))]
#[case::unsupported(json!({ "type": "GeometryCollection", "geometries": [] }))]
#[case::malformed(json!({ "type": "Point", "coordinates": "north" }))]
fn unusable_geometry_keeps_the_feature(#[case] geometry: Value) {
    let place = adapt(json!({ "type": "Feature", "id": "1", "geometry": geometry }))
        .expect("feature is still adapted");

    assert!(place.default_geometry().is_none());
}

#[rstest]
fn polygons_close_their_rings() {
    let place = adapt(json!({
        "type": "Feature",
        "id": "park",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[10.0, 60.0], [10.1, 60.0], [10.1, 60.1], [10.0, 60.1]]],
        },
    }))
    .expect("adapted");

    let Some(PlaceGeometry::Polygon(polygon)) = place.default_geometry() else {
        panic!("expected a polygon");
    };
    assert_eq!(polygon.exterior().0.len(), 5);
}

#[rstest]
fn osm_records_read_their_tags() {
    let tags = BTreeMap::from([
        ("name".to_owned(), "Nidarosdomen".to_owned()),
        ("name:en".to_owned(), "Nidaros Cathedral".to_owned()),
        ("amenity".to_owned(), "place_of_worship".to_owned()),
        ("height".to_owned(), "98".to_owned()),
    ]);
    let place = OsmPlace::new(
        OsmElementRef::Way(42),
        tags,
        vec!["amenity=place_of_worship".to_owned()],
        None,
    );

    assert_eq!(place.id(), "way/42");
    assert_eq!(place.source(), "openstreetmap");
    assert_eq!(place.name(), Some("Nidarosdomen"));
    assert_eq!(place.alternative_names().len(), 1);
    assert_eq!(place.property("height"), Some(PropertyValue::Number(98.0)));
    assert!(place.is_valid());
}

#[rstest]
fn osm_records_without_categories_are_invalid() {
    let place = OsmPlace::new(OsmElementRef::Node(1), BTreeMap::new(), Vec::new(), None);

    assert!(!place.is_valid());
}

#[rstest]
fn survey_municipality_derives_ids_names_and_parent() {
    let place = SurveyPlace::new(
        SurveyObjectKind::Surface,
        10,
        attributes(&[
            ("OBJTYPE", "Kommune"),
            ("KOMMUNENUMMER", "5501"),
            ("NAVN", "Tromsø"),
            ("STEDSNAVN.SPRÅK", "sme"),
            ("STEDSNAVN.NAVN", "Romsa"),
        ]),
        None,
    );

    assert_eq!(place.id(), "5501");
    assert_eq!(place.place_type(), PlaceType::Locality);
    assert_eq!(place.name(), Some("Tromsø"));
    assert_eq!(
        place.alternative_names(),
        BTreeMap::from([("sme".to_owned(), "Romsa".to_owned())])
    );
    assert_eq!(place.parent_id(), Some("55"));
    assert_eq!(place.categories(), ["Kommune"]);
}

#[rstest]
fn survey_primary_name_prefers_norwegian() {
    let place = SurveyPlace::new(
        SurveyObjectKind::Point,
        3,
        attributes(&[
            ("OBJTYPE", "Stedsnavn"),
            ("STEDSNAVN.SPRÅK", "sme"),
            ("STEDSNAVN.NAVN", "Romsa"),
            ("STEDSNAVN.SPRÅK", "nor"),
            ("STEDSNAVN.NAVN", "Tromsø"),
        ]),
        None,
    );

    assert_eq!(place.id(), "3");
    assert_eq!(place.place_type(), PlaceType::PlaceName);
    assert_eq!(place.name(), Some("Tromsø"));
    assert_eq!(place.attribute("SPRÅK"), Some("sme"));
}

#[rstest]
fn survey_county_has_an_iso_code_and_no_parent() {
    let place = SurveyPlace::new(
        SurveyObjectKind::Surface,
        1,
        attributes(&[("OBJTYPE", "Fylke"), ("FYLKESNUMMER", "55"), ("NAVN", "Troms")]),
        None,
    );

    assert_eq!(place.id(), "55");
    assert_eq!(place.iso_code(), Some("NO-55"));
    assert_eq!(place.parent_id(), None);
}

#[rstest]
#[case(SurveyObjectKind::Curve, &[("OBJTYPE", "Kommunegrense")], false)]
#[case(SurveyObjectKind::Point, &[("NAVN", "Uten type")], false)]
#[case(SurveyObjectKind::Text, &[("OBJTYPE", "Stedsnavn")], true)]
fn survey_validity(
    #[case] kind: SurveyObjectKind,
    #[case] pairs: &[(&str, &str)],
    #[case] valid: bool,
) {
    let place = SurveyPlace::new(kind, 1, attributes(pairs), None);

    assert_eq!(place.is_valid(), valid);
}

#[rstest]
fn source_place_forwards_to_its_payload() {
    let record = SourcePlace::from_feature(
        feature(json!({
            "type": "Feature",
            "id": "x",
            "properties": { "name": "Kaia", "area": 12.5 },
        })),
        &GeoJsonOptions {
            source: "kommune".into(),
            place_type: PlaceType::PlaceName,
        },
    )
    .expect("adapted");

    assert_eq!(record.id(), "x");
    assert_eq!(record.source(), "kommune");
    assert_eq!(record.place_type(), PlaceType::PlaceName);
    assert_eq!(record.name(), Some("Kaia"));
    assert_eq!(record.property("area"), Some(PropertyValue::Number(12.5)));
}
