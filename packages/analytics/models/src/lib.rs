#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation result types and tuning parameters.
//!
//! An [`AggregationResult`] is built once per aggregation run and never
//! mutated afterwards; the cache hands out shared read-only references.

use chrono::{DateTime, Utc};
use la_crime_crime_models::{CategoryCounts, CrimeCategory};
use la_crime_source_models::DateWindow;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Direction of change between the requested window and the one before it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    /// Fewer incidents than the preceding window, beyond the threshold.
    Improving,
    /// More incidents than the preceding window, beyond the threshold.
    Worsening,
    /// Within the threshold, or no comparison data.
    Stable,
}

/// Whether a neighborhood's statistics are reliable enough to display
/// without a caveat.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataQuality {
    /// Enough geometrically-bound incidents.
    Sufficient,
    /// Too few incidents, or mostly bound by division name only.
    Insufficient,
}

/// Multiplier applied to each category when computing weighted load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    /// Weight of a violent crime incident.
    pub violent_crime: f64,
    /// Weight of a vehicle theft incident.
    pub vehicle_theft: f64,
    /// Weight of a break-in incident.
    pub break_in: f64,
    /// Weight of a petty theft incident.
    pub petty_theft: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            violent_crime: CrimeCategory::ViolentCrime.default_weight(),
            vehicle_theft: CrimeCategory::VehicleTheft.default_weight(),
            break_in: CrimeCategory::BreakIn.default_weight(),
            petty_theft: CrimeCategory::PettyTheft.default_weight(),
        }
    }
}

impl CategoryWeights {
    /// Weight for one category.
    #[must_use]
    pub const fn get(&self, category: CrimeCategory) -> f64 {
        match category {
            CrimeCategory::ViolentCrime => self.violent_crime,
            CrimeCategory::VehicleTheft => self.vehicle_theft,
            CrimeCategory::BreakIn => self.break_in,
            CrimeCategory::PettyTheft => self.petty_theft,
        }
    }

    /// Weighted sum of `counts`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn weighted_total(&self, counts: &CategoryCounts) -> f64 {
        CrimeCategory::all()
            .iter()
            .map(|category| counts.get(*category) as f64 * self.get(*category))
            .sum()
    }
}

/// Tuning knobs for one aggregation. Part of the cache key, so two runs
/// with different parameters never share a cached result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// Per-category weights for the safety score.
    pub weights: CategoryWeights,
    /// Relative change (0.10 = 10%) beyond which the trend is not stable.
    pub trend_threshold: f64,
    /// Incident count below which statistics are flagged insufficient.
    pub min_incidents: u64,
    /// Share of name-bound incidents above which statistics are flagged
    /// insufficient.
    pub max_name_bound_share: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            trend_threshold: 0.10,
            min_incidents: 5,
            max_name_bound_share: 0.5,
        }
    }
}

/// Computed statistics for one neighborhood in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodStatistics {
    /// Neighborhood name (matches the boundary name).
    pub name: String,
    /// Per-category incident counts in the requested window.
    pub counts: CategoryCounts,
    /// Categorized incidents in the requested window.
    pub total: u64,
    /// Incidents bound to this neighborhood whose description matched no
    /// category. Diagnostic only; excluded from `total`.
    pub unclassified: u64,
    /// Category-weighted incident load the score is derived from.
    pub weighted_total: f64,
    /// 0-100, higher is safer. Relative to this run only.
    pub safety_score: f64,
    /// 0-100 rank of `safety_score` among all neighborhoods in this run.
    pub safety_percentile: f64,
    /// Change against the preceding equal-length window.
    pub trend: Trend,
    /// Categorized incidents in the preceding window, when it was fetched.
    pub previous_total: Option<u64>,
    /// Reliability flag.
    pub data_quality: DataQuality,
    /// Incidents bound by point-in-polygon.
    pub geometric_matches: u64,
    /// Incidents bound by division name only.
    pub name_matches: u64,
    /// Wall-clock time of the aggregation run.
    pub last_updated: DateTime<Utc>,
}

impl NeighborhoodStatistics {
    /// Whether every statistical field equals `other`'s, ignoring
    /// `last_updated`.
    #[must_use]
    pub fn same_statistics(&self, other: &Self) -> bool {
        self.name == other.name
            && self.counts == other.counts
            && self.total == other.total
            && self.unclassified == other.unclassified
            && self.weighted_total.to_bits() == other.weighted_total.to_bits()
            && self.safety_score.to_bits() == other.safety_score.to_bits()
            && self.safety_percentile.to_bits() == other.safety_percentile.to_bits()
            && self.trend == other.trend
            && self.previous_total == other.previous_total
            && self.data_quality == other.data_quality
            && self.geometric_matches == other.geometric_matches
            && self.name_matches == other.name_matches
    }
}

/// Run-level bookkeeping for one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    /// The requested window.
    pub window: DateWindow,
    /// The window used for trend comparison, if one could be formed.
    pub preceding_window: Option<DateWindow>,
    /// Incident records processed from the requested window.
    pub total_incidents: u64,
    /// Records whose description matched no category.
    pub unmapped_category: u64,
    /// Records no neighborhood could be bound to.
    pub unmatched_neighborhood: u64,
    /// Set when the preceding window could not be fetched and every trend
    /// fell back to [`Trend::Stable`].
    pub trend_degraded: bool,
    /// Set when the source stopped at its record ceiling for the requested
    /// window, so counts cover only its oldest incidents.
    pub truncated: bool,
    /// Human-readable notes about partial failures.
    pub notices: Vec<String>,
    /// Wall-clock time of the run.
    pub generated_at: DateTime<Utc>,
}

/// Output of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Statistics ordered safest first (ties broken by name).
    pub neighborhoods: Vec<NeighborhoodStatistics>,
    /// Run metadata.
    pub metadata: RunMetadata,
}

impl AggregationResult {
    /// Looks up one neighborhood by exact name.
    #[must_use]
    pub fn neighborhood(&self, name: &str) -> Option<&NeighborhoodStatistics> {
        self.neighborhoods.iter().find(|n| n.name == name)
    }

    /// Whether both results carry the same statistics, ignoring timestamps.
    #[must_use]
    pub fn same_statistics(&self, other: &Self) -> bool {
        let metadata_matches = {
            let (a, b) = (&self.metadata, &other.metadata);
            a.window == b.window
                && a.preceding_window == b.preceding_window
                && a.total_incidents == b.total_incidents
                && a.unmapped_category == b.unmapped_category
                && a.unmatched_neighborhood == b.unmatched_neighborhood
                && a.trend_degraded == b.trend_degraded
                && a.truncated == b.truncated
                && a.notices == b.notices
        };
        metadata_matches
            && self.neighborhoods.len() == other.neighborhoods.len()
            && self
                .neighborhoods
                .iter()
                .zip(&other.neighborhoods)
                .all(|(a, b)| a.same_statistics(b))
    }
}
