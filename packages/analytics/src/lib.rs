#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-neighborhood crime aggregation.
//!
//! [`aggregator::Aggregator`] pulls incidents for a window (and the window
//! before it), categorizes and binds each one, and reduces them into
//! [`la_crime_analytics_models::AggregationResult`]. Scoring, ranking and
//! trend rules live in [`scoring`] as pure functions.

pub mod aggregator;
pub mod clock;
pub mod scoring;
pub mod tally;

use la_crime_source::SourceError;
use thiserror::Error;

/// Errors that can occur during an aggregation run.
///
/// Cloneable so a single failed build can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    /// Fetching the requested window failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// There are no neighborhood boundaries to aggregate into.
    #[error("No neighborhood boundaries loaded")]
    NoNeighborhoods,

    /// The blocking tally task panicked or was cancelled.
    #[error("Tally failed: {message}")]
    Tally {
        /// Join error reported by the runtime.
        message: String,
    },
}

impl AnalyticsError {
    /// Whether the failure was caused by the caller's request rather than
    /// the upstream.
    #[must_use]
    pub const fn is_invalid_window(&self) -> bool {
        matches!(self, Self::Source(SourceError::InvalidWindow { .. }))
    }
}
