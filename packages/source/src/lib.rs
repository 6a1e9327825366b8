#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime incident source adapter and categorization logic.
//!
//! [`IncidentSource`] is the seam between the aggregation pipeline and the
//! upstream open-data API. [`socrata::SocrataSource`] is the production
//! implementation for the LAPD dataset; tests substitute in-memory fakes.
//!
//! [`type_mapping::categorize`] maps an offense description onto the fixed
//! [`la_crime_crime_models::CrimeCategory`] taxonomy.

pub mod config;
pub mod parsing;
pub mod retry;
pub mod socrata;
pub mod type_mapping;

use async_trait::async_trait;
use la_crime_source_models::{DateWindow, IncidentRecord, InvalidWindowError};

/// Errors that can occur while fetching incidents.
///
/// Cloneable so that one failed fetch can be reported to every caller
/// waiting on the same aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The caller asked for a malformed or out-of-range window. Never retried.
    #[error("Invalid window: {message}")]
    InvalidWindow {
        /// Description of what was wrong.
        message: String,
    },

    /// The upstream API failed or timed out after the retry budget.
    #[error("Source unavailable after {attempts} attempt(s): {message}")]
    SourceUnavailable {
        /// Number of HTTP attempts made for the failing page.
        attempts: u32,
        /// Last failure observed.
        message: String,
    },

    /// The upstream responded successfully but the body was not the
    /// expected JSON shape.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of what went wrong.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {message}")]
    Client {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<InvalidWindowError> for SourceError {
    fn from(value: InvalidWindowError) -> Self {
        Self::InvalidWindow {
            message: value.message,
        }
    }
}

/// Records fetched for one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Normalized incidents inside the window.
    pub records: Vec<IncidentRecord>,
    /// Set when the source stopped at its record ceiling, so `records` holds
    /// only the oldest part of the window.
    pub truncated: bool,
}

impl FetchOutcome {
    /// Every record in the window.
    #[must_use]
    pub const fn complete(records: Vec<IncidentRecord>) -> Self {
        Self {
            records,
            truncated: false,
        }
    }
}

impl From<Vec<IncidentRecord>> for FetchOutcome {
    fn from(records: Vec<IncidentRecord>) -> Self {
        Self::complete(records)
    }
}

/// Anything that can produce incident records for a date window.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"lapd"`).
    fn id(&self) -> &str;

    /// Fetches every incident that occurred inside `window` (inclusive), up
    /// to the source's record ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidWindow`] if the window exceeds the
    /// source's maximum span, and [`SourceError::SourceUnavailable`] if the
    /// upstream keeps failing after retries.
    async fn fetch(&self, window: &DateWindow) -> Result<FetchOutcome, SourceError>;
}
