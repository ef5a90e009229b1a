//! Structural geometry validation
//!
//! Checks shape and range: a recognized type tag, a coordinates member nested
//! to the depth the tag requires, and leaves of exactly two finite numbers
//! inside the WGS 84 longitude / latitude range. Runs after normalization, so a
//! pair still out of range is one no candidate system could resolve. Ring
//! closure, winding order and self-intersection are not checked, so a
//! degenerate but well-formed polygon passes.

use serde_json::Value;

use crate::models::{Geometry, GeometryType};
use crate::transform::is_wgs84_pair;
use atlas_core::error::{AtlasError, Result};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// All errors joined into one line
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate a GeoJSON-shaped geometry value; `None` and `null` are invalid
pub fn validate_geometry(geometry: Option<&Value>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    let Some(Value::Object(object)) = geometry else {
        result.add_error("geometry".to_string(), "Geometry is missing or not an object".to_string());
        return result;
    };

    let Some(tag) = object.get("type").and_then(Value::as_str) else {
        result.add_error("type".to_string(), "Geometry has no type tag".to_string());
        return result;
    };

    let Some(geometry_type) = GeometryType::from_tag(tag) else {
        result.add_error("type".to_string(), format!("Unrecognized geometry type: {}", tag));
        return result;
    };

    let Some(coordinates) = object.get("coordinates") else {
        result.add_error("coordinates".to_string(), format!("{} has no coordinates", tag));
        return result;
    };

    let mut leaves = 0;
    check_nesting(
        coordinates,
        geometry_type.coordinate_depth(),
        "coordinates".to_string(),
        &mut leaves,
        &mut result,
    );

    if result.is_valid && leaves == 0 {
        result.add_error("coordinates".to_string(), format!("{} is empty", tag));
    }

    result
}

fn check_nesting(
    value: &Value,
    depth: usize,
    location: String,
    leaves: &mut usize,
    result: &mut ValidationResult,
) {
    let Value::Array(items) = value else {
        result.add_error(location, "Expected an array".to_string());
        return;
    };

    if depth == 0 {
        *leaves += 1;
        if items.len() != 2 {
            result.add_error(location, format!("Coordinate pair must have 2 values, found {}", items.len()));
            return;
        }
        let (Some(lng), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) else {
            result.add_error(location, "Coordinates must be numbers".to_string());
            return;
        };
        if !lng.is_finite() || !lat.is_finite() {
            result.add_error(location, "Coordinates must be finite numbers".to_string());
        } else if !is_wgs84_pair(lng, lat) {
            result.add_error(location, format!("({}, {}) is outside the WGS 84 range", lng, lat));
        }
        return;
    }

    for (i, item) in items.iter().enumerate() {
        check_nesting(item, depth - 1, format!("{}[{}]", location, i), leaves, result);
        if !result.is_valid {
            // First failure is enough to reject the feature
            return;
        }
    }
}

/// Whether a geometry value is structurally well formed; never fails
pub fn is_valid_geometry(geometry: Option<&Value>) -> bool {
    validate_geometry(geometry).is_valid
}

/// Validate and convert into the canonical geometry type
pub fn parse_geometry(feature_id: &str, geometry: Option<&Value>) -> Result<Geometry> {
    let result = validate_geometry(geometry);
    if !result.is_valid {
        return Err(AtlasError::InvalidGeometry {
            feature_id: feature_id.to_string(),
            reason: result.summary(),
        });
    }

    geometry.and_then(Geometry::from_geojson).ok_or_else(|| AtlasError::InvalidGeometry {
        feature_id: feature_id.to_string(),
        reason: "Geometry could not be decoded".to_string(),
    })
}
