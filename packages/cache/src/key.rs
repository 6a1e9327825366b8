//! Cache keys.

use std::fmt;

use la_crime_analytics_models::AggregationParams;
use la_crime_crime_models::CrimeCategory;
use la_crime_source_models::DateWindow;
use sha2::{Digest, Sha256};

/// Identifies one cached aggregation: the window plus a fingerprint of the
/// parameters it was computed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    /// The aggregated window.
    pub window: DateWindow,
    /// Hex digest of the [`AggregationParams`].
    pub fingerprint: String,
}

impl AggregationKey {
    /// Builds the key for `window` under `params`.
    #[must_use]
    pub fn new(window: DateWindow, params: &AggregationParams) -> Self {
        Self {
            window,
            fingerprint: fingerprint(params),
        }
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.window, self.fingerprint)
    }
}

/// Short SHA-256 digest over every field that affects the output.
#[must_use]
pub fn fingerprint(params: &AggregationParams) -> String {
    let mut hasher = Sha256::new();
    for category in CrimeCategory::all() {
        hasher.update(params.weights.get(*category).to_bits().to_le_bytes());
    }
    hasher.update(params.trend_threshold.to_bits().to_le_bytes());
    hasher.update(params.min_incidents.to_le_bytes());
    hasher.update(params.max_name_bound_share.to_bits().to_le_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use la_crime_source_models::MAX_WINDOW_DAYS;

    use super::*;

    fn window() -> DateWindow {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        DateWindow::new(start, end, MAX_WINDOW_DAYS).unwrap()
    }

    #[test]
    fn same_params_same_key() {
        let params = AggregationParams::default();
        assert_eq!(
            AggregationKey::new(window(), &params),
            AggregationKey::new(window(), &params.clone())
        );
        assert_eq!(fingerprint(&params).len(), 16);
    }

    #[test]
    fn any_param_change_changes_the_fingerprint() {
        let base = AggregationParams::default();

        let mut weighted = base.clone();
        weighted.weights.violent_crime = 5.0;
        let mut threshold = base.clone();
        threshold.trend_threshold = 0.2;
        let mut floor = base.clone();
        floor.min_incidents = 10;

        let prints = [
            fingerprint(&base),
            fingerprint(&weighted),
            fingerprint(&threshold),
            fingerprint(&floor),
        ];
        for (i, a) in prints.iter().enumerate() {
            for b in &prints[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn displays_window_and_fingerprint() {
        let key = AggregationKey::new(window(), &AggregationParams::default());
        assert!(key.to_string().starts_with("2024-01-01..=2024-01-31#"));
    }
}
