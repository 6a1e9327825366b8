#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the LA crime aggregation server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the analytics types so the wire contract can evolve on its own.

use chrono::NaiveDate;
use la_crime_analytics_models::AggregationResult;
use la_crime_crime_models::CrimeCategory;
use serde::{Deserialize, Serialize};

/// Window used when a request names neither `days` nor a date range.
pub const DEFAULT_DAYS: u32 = 30;

/// Query parameters for `GET /api/aggregation`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationQueryParams {
    /// Trailing window length ending today.
    pub days: Option<u32>,
    /// First day of an explicit range (`YYYY-MM-DD`).
    pub start: Option<NaiveDate>,
    /// Last day of an explicit range (`YYYY-MM-DD`), inclusive.
    pub end: Option<NaiveDate>,
}

/// Which window a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRequest {
    /// The last `n` days.
    Days(u32),
    /// An explicit inclusive range.
    Range {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },
}

impl AggregationQueryParams {
    /// Resolves the parameters into a single window request.
    ///
    /// # Errors
    ///
    /// Returns a message if `days` is combined with a range, or only one
    /// end of a range is given.
    pub fn window(&self) -> Result<WindowRequest, String> {
        match (self.days, self.start, self.end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err("use either days or start/end, not both".to_string())
            }
            (Some(days), None, None) => Ok(WindowRequest::Days(days)),
            (None, Some(start), Some(end)) => Ok(WindowRequest::Range { start, end }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err("start and end must be given together".to_string())
            }
            (None, None, None) => Ok(WindowRequest::Days(DEFAULT_DAYS)),
        }
    }
}

/// Query parameters for `POST /api/aggregation/refresh`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshQueryParams {
    /// Trailing window length ending today.
    pub days: Option<u32>,
}

/// An aggregation as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAggregation<'a> {
    /// Set when the upstream is failing and this is an older result.
    pub stale: bool,
    /// The aggregation itself, inlined.
    #[serde(flatten)]
    pub aggregation: &'a AggregationResult,
}

/// One crime category and its scoring weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategory {
    /// Category identifier.
    pub name: CrimeCategory,
    /// Human-readable label.
    pub label: String,
    /// Weight in the safety score.
    pub weight: f64,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error kind.
    pub kind: String,
    /// Human-readable message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Fresh aggregations currently cached.
    pub cached_aggregations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> AggregationQueryParams {
        let pairs: serde_json::Map<String, serde_json::Value> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| {
                let value = v
                    .parse::<u32>()
                    .map_or_else(|_| serde_json::Value::from(v), serde_json::Value::from);
                (k.to_string(), value)
            })
            .collect();
        serde_json::from_value(serde_json::Value::Object(pairs)).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn days_only() {
        assert_eq!(params("days=7").window(), Ok(WindowRequest::Days(7)));
    }

    #[test]
    fn explicit_range() {
        assert_eq!(
            params("start=2024-01-01&end=2024-01-31").window(),
            Ok(WindowRequest::Range {
                start: date("2024-01-01"),
                end: date("2024-01-31"),
            })
        );
    }

    #[test]
    fn nothing_means_the_default_window() {
        assert_eq!(params("").window(), Ok(WindowRequest::Days(DEFAULT_DAYS)));
    }

    #[test]
    fn mixed_or_partial_ranges_are_rejected() {
        assert!(params("days=7&start=2024-01-01").window().is_err());
        assert!(params("start=2024-01-01").window().is_err());
        assert!(params("end=2024-01-31").window().is_err());
    }
}
