//! Attributes incidents to neighborhoods.
//!
//! Resolution order:
//!
//! 1. If the incident has coordinates, the first boundary (in declaration
//!    order) whose polygon contains the point. An R-tree over boundary
//!    envelopes narrows the candidates before the `geo::Contains` test.
//! 2. Otherwise, or when no polygon contains the point, the police division
//!    name via [`crate::area_names::match_area_name`].
//!
//! The binder is immutable after construction and safe to share across
//! threads.

use geo::{Contains, Point};
use la_crime_neighborhood_models::{Binding, BindingMethod, NeighborhoodBoundary};
use la_crime_source_models::IncidentRecord;
use rstar::{AABB, RTree, RTreeObject};

use crate::area_names::{match_area_name, normalize_name};

/// A boundary envelope stored in the R-tree.
struct BoundaryEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built lookup structures over a fixed boundary set.
pub struct NeighborhoodBinder {
    boundaries: Vec<NeighborhoodBoundary>,
    normalized_names: Vec<String>,
    tree: RTree<BoundaryEnvelope>,
}

impl NeighborhoodBinder {
    /// Builds the binder. Boundary order is significant: it breaks ties
    /// between overlapping polygons and between name matches.
    #[must_use]
    pub fn new(boundaries: Vec<NeighborhoodBoundary>) -> Self {
        let normalized_names = boundaries.iter().map(|b| normalize_name(&b.name)).collect();
        let entries = boundaries
            .iter()
            .enumerate()
            .filter_map(|(index, boundary)| {
                compute_envelope(&boundary.geometry).map(|envelope| BoundaryEnvelope { index, envelope })
            })
            .collect();

        Self {
            boundaries,
            normalized_names,
            tree: RTree::bulk_load(entries),
        }
    }

    /// The boundary set, in declaration order.
    #[must_use]
    pub fn boundaries(&self) -> &[NeighborhoodBoundary] {
        &self.boundaries
    }

    /// Number of boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Whether the binder has no boundaries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Binds one incident, or returns `None` if neither its coordinates nor
    /// its area name match any boundary.
    #[must_use]
    pub fn bind(&self, record: &IncidentRecord) -> Option<Binding<'_>> {
        if let Some((lng, lat)) = record.coordinates()
            && let Some(index) = self.locate(lng, lat)
        {
            return Some(self.binding(index, BindingMethod::Geometric));
        }

        match_area_name(&record.area_name, &self.normalized_names)
            .map(|index| self.binding(index, BindingMethod::AreaName))
    }

    /// Returns the first declared boundary containing the point. Points on
    /// a boundary edge are not contained.
    #[must_use]
    pub fn locate(&self, lng: f64, lat: f64) -> Option<usize> {
        let query = AABB::from_point([lng, lat]);
        let point = Point::new(lng, lat);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.index)
            .filter(|index| self.boundaries[*index].geometry.contains(&point))
            .min()
    }

    fn binding(&self, index: usize, method: BindingMethod) -> Binding<'_> {
        Binding {
            index,
            name: &self.boundaries[index].name,
            method,
        }
    }
}

/// Compute the bounding box envelope for a [`geo::MultiPolygon`].
fn compute_envelope(mp: &geo::MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    use geo::BoundingRect;

    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
