//! Boost configuration types and their validation.
#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};

use kartlag_core::{InterchangeWeighting, PlaceType, StopPlaceType, SubMode};
use serde::Deserialize;

use crate::error::BoostConfigError;

/// Key of the wildcard entry in a stop type's sub-mode table.
pub(crate) const WILDCARD: &str = "*";

/// Factor used when a stop type table has no wildcard entry.
const DEFAULT_TYPE_FACTOR: f64 = 1.0;

/// Factors for one stop place type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeBoostConfig {
    default_factor: f64,
    per_sub_mode: HashMap<SubMode, f64>,
}

impl Default for TypeBoostConfig {
    fn default() -> Self {
        Self {
            default_factor: DEFAULT_TYPE_FACTOR,
            per_sub_mode: HashMap::new(),
        }
    }
}

impl TypeBoostConfig {
    /// Factor applied when the sub-mode has no entry of its own.
    #[must_use]
    pub const fn default_factor(&self) -> f64 {
        self.default_factor
    }

    /// Factor for `sub_mode`, falling back to the wildcard factor.
    #[must_use]
    pub fn factor_for(&self, sub_mode: Option<SubMode>) -> f64 {
        sub_mode
            .and_then(|mode| self.per_sub_mode.get(&mode).copied())
            .unwrap_or(self.default_factor)
    }
}

/// Popularity scoring configuration.
///
/// Loaded once at start-up and shared read-only afterwards. Construct it with
/// [`BoostConfig::from_json_str`] or [`crate::load_boost_config`]; the
/// [`Default`] value has no factors and a default popularity of zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoostConfig {
    pub(crate) default_popularity: i64,
    pub(crate) per_type: HashMap<StopPlaceType, TypeBoostConfig>,
    pub(crate) per_interchange: HashMap<InterchangeWeighting, f64>,
    pub(crate) place_type_popularity: HashMap<PlaceType, i64>,
}

impl BoostConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Returns [`BoostConfigError`] when the JSON is malformed, names an
    /// unknown type, sub-mode, interchange weighting or place type, or holds
    /// a negative or non-finite value.
    ///
    /// # Examples
    /// ```
    /// use kartlag_scorer::BoostConfig;
    ///
    /// let config = BoostConfig::from_json_str(r#"{
    ///     "defaultValue": 1000,
    ///     "stopTypeFactors": {"railStation": {"*": 2, "highSpeedRail": 6}},
    ///     "interchangeFactors": {"preferredInterchange": 10}
    /// }"#)?;
    /// assert_eq!(config.default_popularity(), 1000);
    /// # Ok::<(), kartlag_scorer::BoostConfigError>(())
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, BoostConfigError> {
        let raw: RawBoostConfig =
            serde_json::from_str(json).map_err(|source| BoostConfigError::Parse { source })?;
        Self::try_from(raw)
    }

    /// Starting popularity before factors apply.
    #[must_use]
    pub const fn default_popularity(&self) -> i64 {
        self.default_popularity
    }

    /// Factor table for a stop type, if configured.
    #[must_use]
    pub fn type_config(&self, stop_type: StopPlaceType) -> Option<&TypeBoostConfig> {
        self.per_type.get(&stop_type)
    }

    /// Interchange factor, if configured.
    #[must_use]
    pub fn interchange_factor(&self, weighting: InterchangeWeighting) -> Option<f64> {
        self.per_interchange.get(&weighting).copied()
    }

    /// Fixed popularity for a non-stop place type, if configured.
    #[must_use]
    pub fn place_type_popularity(&self, place_type: PlaceType) -> Option<i64> {
        self.place_type_popularity.get(&place_type).copied()
    }
}

/// Wire shape of the configuration document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RawBoostConfig {
    #[serde(default)]
    default_value: i64,
    #[serde(default)]
    stop_type_factors: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    interchange_factors: BTreeMap<String, f64>,
    #[serde(default)]
    place_type_popularity: BTreeMap<String, i64>,
}

impl TryFrom<RawBoostConfig> for BoostConfig {
    type Error = BoostConfigError;

    fn try_from(raw: RawBoostConfig) -> Result<Self, Self::Error> {
        if raw.default_value < 0 {
            return Err(BoostConfigError::NegativePopularity {
                key: "defaultValue".to_owned(),
                value: raw.default_value,
            });
        }

        let mut per_type = HashMap::with_capacity(raw.stop_type_factors.len());
        for (type_key, factors) in raw.stop_type_factors {
            let stop_type = type_key
                .parse::<StopPlaceType>()
                .map_err(|source| BoostConfigError::UnknownStopType { source })?;
            per_type.insert(stop_type, type_config(stop_type, factors)?);
        }

        let mut per_interchange = HashMap::with_capacity(raw.interchange_factors.len());
        for (weight_key, factor) in raw.interchange_factors {
            let weighting = weight_key
                .parse::<InterchangeWeighting>()
                .map_err(|source| BoostConfigError::UnknownInterchange { source })?;
            per_interchange.insert(weighting, checked_factor(&weight_key, factor)?);
        }

        let mut place_type_popularity = HashMap::with_capacity(raw.place_type_popularity.len());
        for (place_key, value) in raw.place_type_popularity {
            let place_type = place_key
                .parse::<PlaceType>()
                .map_err(|source| BoostConfigError::UnknownPlaceType { source })?;
            if value < 0 {
                return Err(BoostConfigError::NegativePopularity {
                    key: place_key,
                    value,
                });
            }
            place_type_popularity.insert(place_type, value);
        }

        Ok(Self {
            default_popularity: raw.default_value,
            per_type,
            per_interchange,
            place_type_popularity,
        })
    }
}

fn type_config(
    stop_type: StopPlaceType,
    factors: BTreeMap<String, f64>,
) -> Result<TypeBoostConfig, BoostConfigError> {
    let mut config = TypeBoostConfig::default();
    for (sub_mode_key, factor) in factors {
        let key = format!("{stop_type}.{sub_mode_key}");
        let checked = checked_factor(&key, factor)?;
        if sub_mode_key == WILDCARD {
            config.default_factor = checked;
            continue;
        }
        let sub_mode = sub_mode_key
            .parse::<SubMode>()
            .map_err(|source| BoostConfigError::UnknownSubMode { stop_type, source })?;
        config.per_sub_mode.insert(sub_mode, checked);
    }
    Ok(config)
}

fn checked_factor(key: &str, factor: f64) -> Result<f64, BoostConfigError> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(factor)
    } else {
        Err(BoostConfigError::InvalidFactor {
            key: key.to_owned(),
            factor,
        })
    }
}
