#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary and binding types.
//!
//! Boundaries are static reference data loaded once at start-up and never
//! mutated. A [`Binding`] records which boundary an incident was attributed
//! to and how confident that attribution is.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A named neighborhood polygon in WGS84 (x = longitude, y = latitude).
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodBoundary {
    /// Unique neighborhood name (e.g. `"Venice"`).
    pub name: String,
    /// Boundary geometry. Single polygons are stored as one-element
    /// multi-polygons.
    pub geometry: MultiPolygon<f64>,
}

/// How an incident was attributed to a neighborhood.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BindingMethod {
    /// The incident's coordinates fall inside the boundary polygon.
    Geometric,
    /// The incident's police division name matched the neighborhood name.
    /// Lower confidence: division and neighborhood boundaries differ.
    AreaName,
}

/// The neighborhood an incident was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding<'a> {
    /// Position of the boundary in the declared boundary list.
    pub index: usize,
    /// Name of the matched neighborhood.
    pub name: &'a str,
    /// How the match was made.
    pub method: BindingMethod,
}
