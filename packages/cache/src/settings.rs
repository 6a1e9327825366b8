//! Service settings.
//!
//! Read from an optional TOML file, then overridden from the environment:
//!
//! ```toml
//! [source]
//! page_size = 2000
//!
//! [aggregation]
//! trend_threshold = 0.15
//!
//! [aggregation.weights]
//! violent_crime = 4.0
//!
//! [cache]
//! ttl_secs = 1800
//! stale_ttl_secs = 86400
//! max_entries = 128
//!
//! [neighborhoods]
//! path = "data/la_neighborhoods.geojson"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use la_crime_analytics_models::AggregationParams;
use la_crime_neighborhood::load::DEFAULT_NAME_PROPERTY;
use la_crime_source::config::{ConfigError, SourceConfig, override_parsed};
use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_STALE_TTL};

/// Default boundary file, relative to the working directory.
pub const DEFAULT_NEIGHBORHOODS_PATH: &str = "data/la_neighborhoods.geojson";

/// Default cache TTL: one hour.
pub const DEFAULT_TTL_SECS: u64 = 3_600;

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Seconds an aggregation stays fresh.
    pub ttl_secs: u64,
    /// Seconds a result stays available as a stale fallback. Never shorter
    /// than the TTL in effect.
    pub stale_ttl_secs: u64,
    /// Most results kept for stale fallback.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            stale_ttl_secs: DEFAULT_STALE_TTL.as_secs(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheSettings {
    /// TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Stale TTL as a [`Duration`].
    #[must_use]
    pub const fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }
}

/// Where neighborhood boundaries come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborhoodSettings {
    /// `GeoJSON` `FeatureCollection` path.
    pub path: PathBuf,
    /// Feature property holding the neighborhood name.
    pub name_property: String,
}

impl Default for NeighborhoodSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_NEIGHBORHOODS_PATH),
            name_property: DEFAULT_NAME_PROPERTY.to_string(),
        }
    }
}

/// Everything needed to assemble an
/// [`AggregationService`](crate::service::AggregationService).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upstream API settings.
    pub source: SourceConfig,
    /// Scoring parameters.
    pub aggregation: AggregationParams,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Boundary file settings.
    pub neighborhoods: NeighborhoodSettings,
}

impl Settings {
    /// Parses settings from TOML. Missing tables and keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document does not match the
    /// schema, or [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(data)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `path` if given, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// override is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => {
                log::info!("Reading settings from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Besides the [`SourceConfig`] keys, recognizes
    /// `LA_CRIME_CACHE_TTL_SECS`, `LA_CRIME_CACHE_STALE_TTL_SECS`,
    /// `LA_CRIME_CACHE_MAX_ENTRIES` and `NEIGHBORHOODS_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is malformed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        self.source.apply_overrides(&lookup)?;
        override_parsed(&lookup, "LA_CRIME_CACHE_TTL_SECS", &mut self.cache.ttl_secs)?;
        override_parsed(
            &lookup,
            "LA_CRIME_CACHE_STALE_TTL_SECS",
            &mut self.cache.stale_ttl_secs,
        )?;
        override_parsed(&lookup, "LA_CRIME_CACHE_MAX_ENTRIES", &mut self.cache.max_entries)?;
        if let Some(path) = lookup("NEIGHBORHOODS_PATH").filter(|s| !s.trim().is_empty()) {
            self.neighborhoods.path = PathBuf::from(path);
        }
        self.validate()
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()?;

        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", 0, "must be at least 1"));
        }

        let params = &self.aggregation;
        let weights = [
            ("aggregation.weights.violent_crime", params.weights.violent_crime),
            ("aggregation.weights.vehicle_theft", params.weights.vehicle_theft),
            ("aggregation.weights.break_in", params.weights.break_in),
            ("aggregation.weights.petty_theft", params.weights.petty_theft),
        ];
        for (key, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(key, weight, "must be a non-negative number"));
            }
        }
        if !params.trend_threshold.is_finite() || params.trend_threshold < 0.0 {
            return Err(invalid(
                "aggregation.trend_threshold",
                params.trend_threshold,
                "must be a non-negative number",
            ));
        }
        if !(0.0..=1.0).contains(&params.max_name_bound_share) {
            return Err(invalid(
                "aggregation.max_name_bound_share",
                params.max_name_bound_share,
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl std::fmt::Display, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}
