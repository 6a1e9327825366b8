#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary loading and incident binding.
//!
//! Boundaries come from a `GeoJSON` `FeatureCollection` of named polygons
//! (see [`load`]). [`binder::NeighborhoodBinder`] attributes incidents to
//! those boundaries, geometrically when the incident has coordinates and
//! by police division name otherwise.

pub mod area_names;
pub mod binder;
pub mod load;

use thiserror::Error;

/// Errors that can occur while loading neighborhood boundaries.
#[derive(Debug, Error)]
pub enum NeighborhoodError {
    /// Reading the boundary file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The boundary file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// Data conversion or normalization error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<geojson::Error> for NeighborhoodError {
    fn from(value: geojson::Error) -> Self {
        Self::GeoJson(Box::new(value))
    }
}
