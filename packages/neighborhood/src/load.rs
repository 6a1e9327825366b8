//! Loads [`NeighborhoodBoundary`] values from a `GeoJSON` feature collection.
//!
//! The neighborhood name is read from a configurable feature property.
//! Features with a missing name or a non-polygonal geometry are skipped with
//! a warning; duplicate names are an error because the name is the key every
//! statistic is reported under.

use std::collections::BTreeSet;
use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use la_crime_neighborhood_models::NeighborhoodBoundary;

use crate::NeighborhoodError;

/// Property that holds the neighborhood name unless told otherwise.
pub const DEFAULT_NAME_PROPERTY: &str = "name";

/// Reads and parses a boundary file.
///
/// # Errors
///
/// Returns [`NeighborhoodError`] if the file cannot be read or parsed, or if
/// it contains no usable boundaries.
pub fn load_file(
    path: &Path,
    name_property: &str,
) -> Result<Vec<NeighborhoodBoundary>, NeighborhoodError> {
    let data = std::fs::read_to_string(path)?;
    let boundaries = parse_feature_collection(&data, name_property)?;
    log::info!(
        "Loaded {} neighborhood boundaries from {}",
        boundaries.len(),
        path.display()
    );
    Ok(boundaries)
}

/// Parses a `GeoJSON` `FeatureCollection` string, preserving feature order.
///
/// # Errors
///
/// Returns [`NeighborhoodError`] if the input is not a feature collection,
/// two features share a name, or no feature is usable.
pub fn parse_feature_collection(
    data: &str,
    name_property: &str,
) -> Result<Vec<NeighborhoodBoundary>, NeighborhoodError> {
    let geojson: GeoJson = data.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(NeighborhoodError::Conversion {
            message: "expected a GeoJSON FeatureCollection".to_string(),
        });
    };

    let total = collection.features.len();
    let mut seen = BTreeSet::new();
    let mut boundaries = Vec::with_capacity(total);

    for (position, feature) in collection.features.into_iter().enumerate() {
        let Some(boundary) = normalize_feature(feature, name_property) else {
            log::warn!("Skipping feature #{position}: missing name or polygon geometry");
            continue;
        };
        if !seen.insert(boundary.name.to_lowercase()) {
            return Err(NeighborhoodError::Conversion {
                message: format!("duplicate neighborhood name {:?}", boundary.name),
            });
        }
        boundaries.push(boundary);
    }

    if boundaries.is_empty() {
        return Err(NeighborhoodError::Conversion {
            message: format!("none of {total} features had a name and polygon geometry"),
        });
    }

    Ok(boundaries)
}

/// Normalizes a single feature.
fn normalize_feature(feature: Feature, name_property: &str) -> Option<NeighborhoodBoundary> {
    let name = feature
        .property(name_property)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let geometry = feature.geometry?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    let geometry = match geo_geom {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => return None,
    };
    if geometry.0.is_empty() {
        return None;
    }

    Some(NeighborhoodBoundary { name, geometry })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Venice" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-118.48, 33.98], [-118.45, 33.98], [-118.45, 34.00], [-118.48, 34.00], [-118.48, 33.98]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Islands" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                        [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Trailhead" },
                "geometry": { "type": "Point", "coordinates": [-118.3, 34.1] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            }
        ]
    }"#;

    #[test]
    fn keeps_named_polygons_in_order() {
        let boundaries = parse_feature_collection(COLLECTION, DEFAULT_NAME_PROPERTY).unwrap();
        let names: Vec<&str> = boundaries.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Venice", "Islands"]);
        assert_eq!(boundaries[0].geometry.0.len(), 1);
        assert_eq!(boundaries[1].geometry.0.len(), 2);
    }

    #[test]
    fn custom_name_property() {
        let data = COLLECTION.replace("\"name\"", "\"NAME\"");
        let boundaries = parse_feature_collection(&data, "NAME").unwrap();
        assert_eq!(boundaries.len(), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let data = COLLECTION.replace("Islands", "venice");
        let err = parse_feature_collection(&data, DEFAULT_NAME_PROPERTY).unwrap_err();
        assert!(matches!(err, NeighborhoodError::Conversion { .. }));
    }

    #[test]
    fn rejects_non_collections() {
        let err = parse_feature_collection(
            r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#,
            DEFAULT_NAME_PROPERTY,
        )
        .unwrap_err();
        assert!(matches!(err, NeighborhoodError::Conversion { .. }));
    }

    #[test]
    fn rejects_collections_without_usable_features() {
        let data = r#"{ "type": "FeatureCollection", "features": [] }"#;
        assert!(parse_feature_collection(data, DEFAULT_NAME_PROPERTY).is_err());
    }
}
