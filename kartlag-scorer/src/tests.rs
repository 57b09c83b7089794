//! Unit coverage for boost configuration loading and scoring.
#![forbid(unsafe_code)]

use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use kartlag_core::{
    CanonicalPlace, InterchangeWeighting, PlaceType, StopAttributes, StopMode, StopPlaceType,
    SubMode,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::{BoostConfig, BoostConfigError, PopularityScorer, load_boost_config};

const WORKED_CONFIG: &str = r#"{
    "defaultValue": 1000,
    "stopTypeFactors": {
        "railStation": {"highSpeedRail": 6},
        "airport": {"*": 2}
    },
    "interchangeFactors": {"preferredInterchange": 10, "recommendedInterchange": 1.5}
}"#;

#[fixture]
fn worked_config() -> BoostConfig {
    BoostConfig::from_json_str(WORKED_CONFIG).expect("worked configuration parses")
}

const fn pair(stop_type: Option<StopPlaceType>, sub_mode: Option<SubMode>) -> StopMode {
    StopMode::new(stop_type, sub_mode)
}

#[rstest]
#[case::no_pairs(&[], None)]
#[case::rail_pair(&[pair(Some(StopPlaceType::RailStation), Some(SubMode::HighSpeedRail))], None)]
#[case::with_interchange(
    &[pair(Some(StopPlaceType::Airport), None)],
    Some(InterchangeWeighting::PreferredInterchange)
)]
fn empty_configuration_scores_zero(
    #[case] modes: &[StopMode],
    #[case] interchange: Option<InterchangeWeighting>,
) {
    let config = BoostConfig::from_json_str("{}").expect("empty configuration parses");

    assert_eq!(config.score(modes, interchange), 0);
}

#[rstest]
fn scores_single_pair_with_interchange(worked_config: BoostConfig) {
    let modes = [pair(
        Some(StopPlaceType::RailStation),
        Some(SubMode::HighSpeedRail),
    )];

    let popularity = worked_config.score(&modes, Some(InterchangeWeighting::PreferredInterchange));

    assert_eq!(popularity, 60_000);
}

#[rstest]
fn sums_factors_across_pairs(worked_config: BoostConfig) {
    let modes = [
        pair(Some(StopPlaceType::RailStation), Some(SubMode::HighSpeedRail)),
        pair(Some(StopPlaceType::Airport), None),
        pair(Some(StopPlaceType::FerryPort), None),
    ];

    let popularity = worked_config.score(&modes, Some(InterchangeWeighting::PreferredInterchange));

    assert_eq!(popularity, 80_000);
}

#[rstest]
#[case::missing_type(pair(None, Some(SubMode::LocalBus)))]
#[case::unconfigured_type(pair(Some(StopPlaceType::FerryPort), None))]
fn zero_sum_leaves_default_popularity(worked_config: BoostConfig, #[case] mode: StopMode) {
    assert_eq!(worked_config.score(&[mode], None), 1000);
}

#[rstest]
fn unconfigured_sub_mode_uses_wildcard(worked_config: BoostConfig) {
    let modes = [pair(Some(StopPlaceType::Airport), Some(SubMode::DomesticFlight))];

    assert_eq!(worked_config.score(&modes, None), 2000);
}

#[rstest]
fn missing_wildcard_defaults_to_one() {
    let config = BoostConfig::from_json_str(
        r#"{"defaultValue": 50, "stopTypeFactors": {"busStation": {"regionalBus": 4}}}"#,
    )
    .expect("configuration parses");

    let modes = [pair(Some(StopPlaceType::BusStation), Some(SubMode::LocalBus))];

    assert_eq!(config.score(&modes, None), 50);
}

#[rstest]
fn fractional_interchange_factor_truncates(worked_config: BoostConfig) {
    let modes = [pair(Some(StopPlaceType::Airport), None)];

    let popularity =
        worked_config.score(&modes, Some(InterchangeWeighting::RecommendedInterchange));

    assert_eq!(popularity, 3000);
}

#[rstest]
fn interchange_applies_without_type_factor(worked_config: BoostConfig) {
    let popularity = worked_config.score(&[], Some(InterchangeWeighting::PreferredInterchange));

    assert_eq!(popularity, 10_000);
}

#[rstest]
fn zero_interchange_factor_still_applies() {
    let config = BoostConfig::from_json_str(
        r#"{"defaultValue": 500, "interchangeFactors": {"noInterchange": 0}}"#,
    )
    .expect("configuration parses");

    assert_eq!(
        config.score(&[], Some(InterchangeWeighting::NoInterchange)),
        0
    );
}

#[rstest]
#[case::unknown_type(
    r#"{"stopTypeFactors": {"spaceport": {"*": 1}}}"#,
    "UnknownStopType"
)]
#[case::unknown_sub_mode(
    r#"{"stopTypeFactors": {"railStation": {"hyperloop": 1}}}"#,
    "UnknownSubMode"
)]
#[case::unknown_interchange(
    r#"{"interchangeFactors": {"mandatoryInterchange": 2}}"#,
    "UnknownInterchange"
)]
#[case::unknown_place_type(r#"{"placeTypePopularity": {"planet": 2}}"#, "UnknownPlaceType")]
#[case::negative_factor(
    r#"{"stopTypeFactors": {"railStation": {"*": -1}}}"#,
    "InvalidFactor"
)]
#[case::negative_default(r#"{"defaultValue": -5}"#, "NegativePopularity")]
#[case::unknown_field(r#"{"defaultValue": 1, "boost": 2}"#, "Parse")]
#[case::malformed(r#"{"defaultValue": "#, "Parse")]
fn rejects_invalid_configuration(#[case] json: &str, #[case] expected: &str) {
    let err = BoostConfig::from_json_str(json).expect_err("configuration should be rejected");

    let variant = match err {
        BoostConfigError::Read { .. } => "Read",
        BoostConfigError::Parse { .. } => "Parse",
        BoostConfigError::UnknownStopType { .. } => "UnknownStopType",
        BoostConfigError::UnknownSubMode { .. } => "UnknownSubMode",
        BoostConfigError::UnknownInterchange { .. } => "UnknownInterchange",
        BoostConfigError::UnknownPlaceType { .. } => "UnknownPlaceType",
        BoostConfigError::InvalidFactor { .. } => "InvalidFactor",
        BoostConfigError::NegativePopularity { .. } => "NegativePopularity",
    };
    assert_eq!(variant, expected);
}

#[rstest]
fn loads_configuration_from_file() {
    let dir = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("boost.json")).expect("utf8 path");
    let mut file = std::fs::File::create(&path).expect("create config file");
    file.write_all(WORKED_CONFIG.as_bytes())
        .expect("write config file");

    let config = load_boost_config(&path).expect("load configuration");

    assert_eq!(config.default_popularity(), 1000);
    assert!(config.type_config(StopPlaceType::Airport).is_some());
}

#[rstest]
fn missing_file_reports_path() {
    let dir = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.json")).expect("utf8 path");

    let err = load_boost_config(&path).expect_err("missing file should fail");

    assert!(
        matches!(&err, BoostConfigError::Read { path: reported, .. } if *reported == path),
        "unexpected error: {err:?}"
    );
}

#[rstest]
fn scorer_scores_stop_places(worked_config: BoostConfig) {
    let scorer = PopularityScorer::new(Arc::new(worked_config));
    let mut stop = CanonicalPlace::new("NSR:StopPlace:1", "nsr", PlaceType::StopPlace);
    stop.stop = Some(StopAttributes {
        modes: vec![pair(
            Some(StopPlaceType::RailStation),
            Some(SubMode::HighSpeedRail),
        )],
        interchange: Some(InterchangeWeighting::PreferredInterchange),
    });

    let scored = scorer.score_place(stop);

    assert_eq!(scored.popularity, Some(60_000));
}

#[rstest]
fn scorer_uses_place_type_popularity() {
    let config = BoostConfig::from_json_str(r#"{"placeTypePopularity": {"poi": 40}}"#)
        .expect("configuration parses");
    let scorer = PopularityScorer::new(Arc::new(config));

    let poi = scorer.score_place(CanonicalPlace::new("n1", "osm", PlaceType::Poi));
    let county = scorer.score_place(CanonicalPlace::new("03", "kartverket", PlaceType::County));

    assert_eq!(poi.popularity, Some(40));
    assert_eq!(county.popularity, None);
}
