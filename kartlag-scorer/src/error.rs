//! Error types raised while loading the boost configuration.
#![forbid(unsafe_code)]

use camino::Utf8PathBuf;
use kartlag_core::{StopPlaceType, UnknownValueError};
use thiserror::Error;

/// Errors raised while loading or validating a boost configuration.
///
/// Any error means no part of the configuration was applied.
#[derive(Debug, Error)]
pub enum BoostConfigError {
    /// Reading the configuration file failed.
    #[error("failed to read boost configuration at {path}")]
    Read {
        /// Requested configuration path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// The document was not valid configuration JSON.
    #[error("failed to parse boost configuration")]
    Parse {
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A `stopTypeFactors` key is not a known stop place type.
    #[error("unknown stop place type in stopTypeFactors")]
    UnknownStopType {
        /// The rejected spelling.
        #[source]
        source: UnknownValueError,
    },
    /// A sub-mode key under a stop type is not a known sub-mode.
    #[error("unknown sub-mode for stop place type {stop_type}")]
    UnknownSubMode {
        /// Stop type whose table contained the key.
        stop_type: StopPlaceType,
        /// The rejected spelling.
        #[source]
        source: UnknownValueError,
    },
    /// An `interchangeFactors` key is not a known interchange weighting.
    #[error("unknown interchange weighting in interchangeFactors")]
    UnknownInterchange {
        /// The rejected spelling.
        #[source]
        source: UnknownValueError,
    },
    /// A `placeTypePopularity` key is not a known place type.
    #[error("unknown place type in placeTypePopularity")]
    UnknownPlaceType {
        /// The rejected spelling.
        #[source]
        source: UnknownValueError,
    },
    /// A factor was negative or not finite.
    #[error("factor {factor} for {key} must be a finite, non-negative number")]
    InvalidFactor {
        /// Dotted path of the offending entry.
        key: String,
        /// The rejected factor.
        factor: f64,
    },
    /// A popularity value was negative.
    #[error("popularity {value} for {key} must not be negative")]
    NegativePopularity {
        /// Name of the offending entry.
        key: String,
        /// The rejected value.
        value: i64,
    },
}
