//! Popularity scoring for Kartlag places.
//!
//! Stop places are scored with a configurable multiplicative model:
//! - start from the configured default popularity;
//! - sum the factors of every `(stop type, sub-mode)` pair the stop carries
//!   and, when the truncated sum is positive, multiply by it;
//! - multiply by the interchange factor when the stop's weighting has one.
//!
//! Other places receive the fixed popularity configured for their type, if
//! any. The configuration is immutable once loaded and is shared between
//! pipelines behind an [`Arc`](std::sync::Arc).
//!
//! # Examples
//!
//! ```
//! use kartlag_core::{InterchangeWeighting, StopMode, StopPlaceType, SubMode};
//! use kartlag_scorer::BoostConfig;
//!
//! let config = BoostConfig::from_json_str(r#"{
//!     "defaultValue": 1000,
//!     "stopTypeFactors": {"railStation": {"highSpeedRail": 6}},
//!     "interchangeFactors": {"preferredInterchange": 10}
//! }"#)?;
//! let modes = [StopMode::new(Some(StopPlaceType::RailStation), Some(SubMode::HighSpeedRail))];
//! let popularity = config.score(&modes, Some(InterchangeWeighting::PreferredInterchange));
//! assert_eq!(popularity, 60_000);
//! # Ok::<(), kartlag_scorer::BoostConfigError>(())
//! ```

#![forbid(unsafe_code)]

use std::io::Read;
use std::sync::Arc;

use camino::Utf8Path;
use kartlag_core::{CanonicalPlace, InterchangeWeighting, StopMode};
use kartlag_fs::open_utf8_file;
use log::{debug, info};

mod error;
mod types;

pub use error::BoostConfigError;
pub use types::{BoostConfig, TypeBoostConfig};

/// Load and validate a boost configuration file.
///
/// # Errors
/// Returns [`BoostConfigError::Read`] when the file cannot be read and the
/// validation errors of [`BoostConfig::from_json_str`] otherwise.
pub fn load_boost_config(path: &Utf8Path) -> Result<BoostConfig, BoostConfigError> {
    let read_error = |source| BoostConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut contents = String::new();
    open_utf8_file(path)
        .map_err(read_error)?
        .read_to_string(&mut contents)
        .map_err(read_error)?;
    let config = BoostConfig::from_json_str(&contents)?;
    info!(
        "Loaded boost configuration from {path} ({} stop types, {} interchange factors)",
        config.per_type.len(),
        config.per_interchange.len()
    );
    Ok(config)
}

impl BoostConfig {
    /// Compute the popularity for a stop's mode pairs and interchange weighting.
    ///
    /// A pair whose type is missing or unconfigured contributes `0`; a missing
    /// sub-mode uses the type's wildcard factor. The summed factor only
    /// multiplies when its truncated value is positive; the interchange factor
    /// always applies when configured.
    #[must_use]
    pub fn score(&self, modes: &[StopMode], interchange: Option<InterchangeWeighting>) -> i64 {
        let type_factor = truncate(modes.iter().map(|mode| self.mode_factor(*mode)).sum());
        let mut popularity = self.default_popularity;
        if type_factor > 0 {
            popularity = popularity.saturating_mul(type_factor);
        }
        if let Some(factor) = interchange.and_then(|weighting| self.interchange_factor(weighting))
        {
            popularity = scale(popularity, factor);
        }
        popularity
    }

    fn mode_factor(&self, mode: StopMode) -> f64 {
        mode.stop_type
            .and_then(|stop_type| self.type_config(stop_type))
            .map_or(0.0, |config| config.factor_for(mode.sub_mode))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "factors are truncated to whole multipliers; `as` saturates out-of-range values"
)]
fn truncate(factor: f64) -> i64 {
    factor.floor() as i64
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    reason = "interchange factors may be fractional; the product is truncated back to an integer"
)]
fn scale(popularity: i64, factor: f64) -> i64 {
    (popularity as f64 * factor).trunc() as i64
}

/// Applies a shared [`BoostConfig`] to canonical places.
#[derive(Debug, Clone)]
pub struct PopularityScorer {
    config: Arc<BoostConfig>,
}

impl PopularityScorer {
    /// Wrap a shared configuration.
    #[must_use]
    pub const fn new(config: Arc<BoostConfig>) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &BoostConfig {
        &self.config
    }

    /// Return `place` with its popularity set.
    ///
    /// Stop places are scored from their modes and interchange weighting.
    /// Other places take the fixed popularity configured for their type and
    /// are returned unscored when none is configured.
    #[must_use]
    pub fn score_place(&self, place: CanonicalPlace) -> CanonicalPlace {
        let popularity = match &place.stop {
            Some(stop) => Some(self.config.score(&stop.modes, stop.interchange)),
            None => self.config.place_type_popularity(place.place_type),
        };
        match popularity {
            Some(value) => {
                debug!("Scored {} {} at {value}", place.place_type, place.id);
                place.with_popularity(value)
            }
            None => place,
        }
    }
}

#[cfg(test)]
mod tests;
