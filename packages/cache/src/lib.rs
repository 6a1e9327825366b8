#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation cache and query service.
//!
//! [`service::AggregationService`] is the single process-wide entry point:
//! it turns "last N days" or explicit date ranges into windows, serves them
//! from [`cache::AggregationCache`], and falls back to the last good result
//! when a rebuild fails.

pub mod cache;
pub mod key;
pub mod service;
pub mod settings;

use la_crime_neighborhood::NeighborhoodError;
use la_crime_source::SourceError;
use la_crime_source::config::ConfigError;
use thiserror::Error;

/// Errors raised while assembling the service.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Settings could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Boundary file could not be loaded.
    #[error("Failed to load neighborhoods: {0}")]
    Neighborhoods(#[from] NeighborhoodError),

    /// The upstream client could not be built.
    #[error(transparent)]
    Source(#[from] SourceError),
}
