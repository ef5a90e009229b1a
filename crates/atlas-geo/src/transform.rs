//! CRS detection and normalization into WGS 84
//!
//! Geometries arrive as raw GeoJSON-shaped values whose coordinates may be in
//! WGS 84 degrees or in one of the Austrian projected systems. The first leaf
//! pair decides for the whole geometry: if it already lies in the WGS 84 range
//! the geometry is returned untouched, otherwise every pair is run through the
//! candidate systems in priority order. Geometries mixing systems are not
//! supported and are assumed not to occur.

use proj::Proj;
use serde_json::Value;

use crate::models::Crs;
use atlas_core::models::WGS84_EPSG;

/// Target system handed to PROJ; longitude first
pub const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// Whether a pair lies in the WGS 84 longitude / latitude range
pub fn is_wgs84_pair(lng: f64, lat: f64) -> bool {
    lng.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lng) && (-90.0..=90.0).contains(&lat)
}

/// Outcome of normalizing one geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Geometry with WGS 84 coordinates (or the input, if it already was)
    pub geometry: Value,

    /// Whether any transform was applied
    pub reprojected: bool,

    /// System the first pair was found to be in, None when nothing resolved it
    pub source_epsg: Option<u32>,

    /// Pairs no candidate could bring into range; they keep their original values
    pub unresolved: usize,
}

struct Candidate {
    crs: Crs,
    proj: Proj,
}

/// Reprojects geometries from a fixed list of candidate systems into WGS 84
pub struct CoordinateNormalizer {
    candidates: Vec<Candidate>,
}

impl CoordinateNormalizer {
    /// Build transforms for each candidate, in priority order
    ///
    /// A candidate whose transform cannot be constructed is dropped with a warning.
    /// WGS 84 itself is never a candidate; the range gate already covers it.
    pub fn new(candidates: &[Crs]) -> Self {
        let candidates = candidates
            .iter()
            .filter(|crs| !crs.is_wgs84())
            .filter_map(|crs| {
                match Proj::new_known_crs(&crs.proj_definition(), WGS84_DEFINITION, None) {
                    Ok(proj) => Some(Candidate { crs: crs.clone(), proj }),
                    Err(e) => {
                        tracing::warn!(
                            epsg = crs.epsg,
                            "Dropping candidate CRS {}: failed to build transform: {}",
                            crs.name,
                            e
                        );
                        None
                    }
                }
            })
            .collect();

        Self { candidates }
    }

    /// Normalizer over the three Austrian systems
    pub fn austrian() -> Self {
        Self::new(&Crs::austrian_candidates())
    }

    /// EPSG codes of the usable candidates, in priority order
    pub fn candidate_codes(&self) -> Vec<u32> {
        self.candidates.iter().map(|c| c.crs.epsg).collect()
    }

    /// Normalize using the default candidate order
    pub fn normalize(&self, geometry: &Value) -> Normalized {
        self.normalize_with_hint(geometry, None)
    }

    /// Normalize, trying the declared source system first when it is a candidate
    pub fn normalize_with_hint(&self, geometry: &Value, hint: Option<u32>) -> Normalized {
        let unchanged = |source_epsg| Normalized {
            geometry: geometry.clone(),
            reprojected: false,
            source_epsg,
            unresolved: 0,
        };

        let Some(coordinates) = geometry.get("coordinates") else {
            return unchanged(None);
        };
        let Some((x, y)) = first_pair(coordinates) else {
            return unchanged(None);
        };
        if is_wgs84_pair(x, y) {
            return unchanged(Some(WGS84_EPSG));
        }

        let order = self.priority_order(hint);
        let source_epsg = self.resolve_pair(x, y, &order).map(|(_, epsg)| epsg);

        let mut unresolved = 0;
        let transformed = self.transform_nested(coordinates, &order, &mut unresolved);

        let mut output = geometry.clone();
        if let Some(slot) = output.get_mut("coordinates") {
            *slot = transformed;
        }

        Normalized { geometry: output, reprojected: true, source_epsg, unresolved }
    }

    /// Detect which system a geometry's first pair is in, without transforming it
    pub fn detect(&self, geometry: &Value, hint: Option<u32>) -> Option<u32> {
        let (x, y) = first_pair(geometry.get("coordinates")?)?;
        if is_wgs84_pair(x, y) {
            return Some(WGS84_EPSG);
        }
        self.resolve_pair(x, y, &self.priority_order(hint)).map(|(_, epsg)| epsg)
    }

    /// Candidate indices with the hinted system moved to the front
    fn priority_order(&self, hint: Option<u32>) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.candidates.len()).collect();
        if let Some(pos) = hint.and_then(|h| self.candidates.iter().position(|c| c.crs.epsg == h)) {
            order.remove(pos);
            order.insert(0, pos);
        }
        order
    }

    /// First candidate whose output lands in range; transform errors count as misses
    fn resolve_pair(&self, x: f64, y: f64, order: &[usize]) -> Option<([f64; 2], u32)> {
        order.iter().find_map(|&i| {
            let candidate = &self.candidates[i];
            match candidate.proj.convert((x, y)) {
                Ok((lng, lat)) if is_wgs84_pair(lng, lat) => Some(([lng, lat], candidate.crs.epsg)),
                Ok(_) => None,
                Err(e) => {
                    tracing::trace!(epsg = candidate.crs.epsg, "Transform failed for ({}, {}): {}", x, y, e);
                    None
                }
            }
        })
    }

    fn transform_nested(&self, value: &Value, order: &[usize], unresolved: &mut usize) -> Value {
        let Value::Array(items) = value else {
            return value.clone();
        };

        if let Some((x, y)) = leaf_pair(items) {
            return match self.resolve_pair(x, y, order) {
                Some(([lng, lat], _)) => {
                    let mut pair = items.clone();
                    pair[0] = number(lng);
                    pair[1] = number(lat);
                    Value::Array(pair)
                }
                None => {
                    *unresolved += 1;
                    value.clone()
                }
            };
        }
        if is_leaf(items) {
            // Malformed leaf; left for the validator to reject
            return value.clone();
        }

        Value::Array(items.iter().map(|item| self.transform_nested(item, order, unresolved)).collect())
    }
}

/// A leaf is an array whose first element is a number
fn is_leaf(items: &[Value]) -> bool {
    items.first().map(Value::is_number).unwrap_or(false)
}

fn leaf_pair(items: &[Value]) -> Option<(f64, f64)> {
    if !is_leaf(items) {
        return None;
    }
    Some((items.first()?.as_f64()?, items.get(1)?.as_f64()?))
}

/// First leaf pair in document order
pub fn first_pair(coordinates: &Value) -> Option<(f64, f64)> {
    let Value::Array(items) = coordinates else {
        return None;
    };
    if is_leaf(items) {
        return leaf_pair(items);
    }
    items.iter().find_map(first_pair)
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
