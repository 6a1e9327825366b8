#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident records and date windows.
//!
//! An [`IncidentRecord`] is one report pulled from the upstream open-data
//! feed after field normalization. Records are immutable once fetched and
//! only live for the aggregation run that consumes them.
//!
//! A [`DateWindow`] is the inclusive range of occurrence dates a fetch or an
//! aggregation covers.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Longest window, in days, any caller may request.
pub const MAX_WINDOW_DAYS: u32 = 1825;

/// A crime incident normalized from the upstream feed.
///
/// Coordinates are optional. Incidents without usable lat/lng are still
/// bound to a neighborhood through their administrative area name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Upstream report number (unique per incident).
    pub report_id: String,
    /// When the incident was reported, if the feed provides it.
    pub reported_at: Option<DateTime<Utc>>,
    /// When the incident occurred.
    pub occurred_at: DateTime<Utc>,
    /// Free-text offense description (e.g. `"VEHICLE - STOLEN"`).
    pub description: String,
    /// Police division / administrative area (e.g. `"Mid-Wilshire Division"`).
    pub area_name: String,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
}

impl IncidentRecord {
    /// Returns `(longitude, latitude)` when both coordinates are present.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lng), Some(lat)) => Some((lng, lat)),
            _ => None,
        }
    }
}

/// Error returned when a requested date window is malformed or too long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWindowError {
    /// What was wrong with the window.
    pub message: String,
}

impl std::fmt::Display for InvalidWindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid date window: {}", self.message)
    }
}

impl std::error::Error for InvalidWindowError {}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Creates a window covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindowError`] if `end` precedes `start` or the window
    /// spans more than `max_days` days.
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: u32) -> Result<Self, InvalidWindowError> {
        if end < start {
            return Err(InvalidWindowError {
                message: format!("end date {end} is before start date {start}"),
            });
        }
        let window = Self { start, end };
        if window.len_days() > u64::from(max_days) {
            return Err(InvalidWindowError {
                message: format!(
                    "{start}..={end} spans {} days, maximum is {max_days}",
                    window.len_days()
                ),
            });
        }
        Ok(window)
    }

    /// Creates the `days`-long window ending on (and including) `today`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindowError`] if `days` is outside `1..=max_days`.
    pub fn ending_on(today: NaiveDate, days: u32, max_days: u32) -> Result<Self, InvalidWindowError> {
        if days == 0 || days > max_days {
            return Err(InvalidWindowError {
                message: format!("{days} days is outside the allowed range 1..={max_days}"),
            });
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| InvalidWindowError {
                message: format!("{days} days before {today} is out of range"),
            })?;
        Self::new(start, today, max_days)
    }

    /// First day of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn len_days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// The equal-length window immediately before this one.
    ///
    /// Returns `None` only when the preceding window would fall before the
    /// earliest representable date.
    #[must_use]
    pub fn preceding(&self) -> Option<Self> {
        let end = self.start.checked_sub_days(Days::new(1))?;
        let start = self.start.checked_sub_days(Days::new(self.len_days()))?;
        Some(Self { start, end })
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
