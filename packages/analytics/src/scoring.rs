//! Safety score, percentile, trend and data-quality rules.
//!
//! Scores are min/max normalized within a single run, so a score of 80 in
//! one run is not comparable with 80 in a run over a different window.

use la_crime_analytics_models::{DataQuality, Trend};

/// Score given to every neighborhood when all weighted loads are equal.
pub const FLAT_SCORE: f64 = 50.0;

/// Percentile given when there is nothing to rank against.
pub const FLAT_PERCENTILE: f64 = 50.0;

/// Maps weighted incident loads to 0-100 safety scores.
///
/// The lowest load scores 100 and the highest scores 0, linearly in
/// between. When every load is equal (including a single neighborhood),
/// every score is [`FLAT_SCORE`].
#[must_use]
pub fn safety_scores(weighted_loads: &[f64]) -> Vec<f64> {
    let min = weighted_loads.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weighted_loads
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    weighted_loads
        .iter()
        .map(|load| {
            if span > 0.0 {
                (100.0 * (max - load) / span).clamp(0.0, 100.0)
            } else {
                FLAT_SCORE
            }
        })
        .collect()
}

/// Ranks scores into 0-100 percentiles.
///
/// For a score with `below` strictly lower and `above` strictly higher
/// scores, the percentile is `below / (below + above) * 100`. Without ties
/// this is `rank / (count - 1) * 100` with rank 0 for the lowest score.
/// Tied scores share a percentile, the lowest score is always 0 and the
/// highest always 100. A single neighborhood, or a run where every score is
/// equal, gets [`FLAT_PERCENTILE`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentiles(scores: &[f64]) -> Vec<f64> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    scores
        .iter()
        .map(|score| {
            let below = sorted.partition_point(|s| s.total_cmp(score).is_lt());
            let not_above = sorted.partition_point(|s| s.total_cmp(score).is_le());
            let above = sorted.len() - not_above;
            if below + above == 0 {
                FLAT_PERCENTILE
            } else {
                below as f64 / (below + above) as f64 * 100.0
            }
        })
        .collect()
}

/// Compares a window's total with the preceding window's.
///
/// `None` for `previous` (comparison data unavailable) is always
/// [`Trend::Stable`]. A rise from zero is [`Trend::Worsening`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend(current: u64, previous: Option<u64>, threshold: f64) -> Trend {
    let Some(previous) = previous else {
        return Trend::Stable;
    };
    if previous == 0 {
        return if current == 0 {
            Trend::Stable
        } else {
            Trend::Worsening
        };
    }

    let change = (current as f64 - previous as f64) / previous as f64;
    if change < -threshold {
        Trend::Improving
    } else if change > threshold {
        Trend::Worsening
    } else {
        Trend::Stable
    }
}

/// Flags noisy statistics: too few incidents, or too many bound by division
/// name rather than by coordinates.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn data_quality(
    total: u64,
    name_matches: u64,
    min_incidents: u64,
    max_name_bound_share: f64,
) -> DataQuality {
    if total < min_incidents {
        return DataQuality::Insufficient;
    }
    if total > 0 && name_matches as f64 / total as f64 > max_name_bound_share {
        return DataQuality::Insufficient;
    }
    DataQuality::Sufficient
}
