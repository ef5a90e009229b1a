//! Douglas-Peucker simplification of over-complex lines and polygons
//!
//! Simplification is best effort: when the result would be degenerate (a line
//! under two points, a ring under four) or non-finite, the original geometry is
//! returned unchanged.

use geo::Simplify;

use crate::models::{from_geo_geometry, to_geo_geometry, Geometry};

/// Inputs above this many vertices are stored as-is rather than simplified
pub const MAX_SIMPLIFY_VERTICES: usize = 5_000_000;

/// Simplify with `tolerance` as maximum perpendicular deviation, in degrees
pub fn simplify(geometry: &Geometry, tolerance: f64) -> Geometry {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return geometry.clone();
    }

    let simplified = match to_geo_geometry(geometry) {
        geo::Geometry::LineString(ls) => geo::Geometry::LineString(ls.simplify(tolerance)),
        geo::Geometry::MultiLineString(mls) => geo::Geometry::MultiLineString(mls.simplify(tolerance)),
        geo::Geometry::Polygon(p) => geo::Geometry::Polygon(p.simplify(tolerance)),
        geo::Geometry::MultiPolygon(mp) => geo::Geometry::MultiPolygon(mp.simplify(tolerance)),
        _ => return geometry.clone(),
    };

    match from_geo_geometry(&simplified) {
        Some(result) if is_usable(&result) && result.vertex_count() <= geometry.vertex_count() => result,
        _ => {
            tracing::debug!(
                geometry_type = ?geometry.geometry_type(),
                "Simplification produced a degenerate result, keeping original"
            );
            geometry.clone()
        }
    }
}

/// Simplify only when the vertex count exceeds `threshold`
pub fn simplify_if_complex(geometry: &Geometry, threshold: usize, tolerance: f64) -> Geometry {
    let vertices = geometry.vertex_count();
    if vertices <= threshold {
        return geometry.clone();
    }
    if vertices > MAX_SIMPLIFY_VERTICES {
        tracing::warn!(vertices, "Geometry too large to simplify, storing unsimplified");
        return geometry.clone();
    }

    let simplified = simplify(geometry, tolerance);
    tracing::debug!(before = vertices, after = simplified.vertex_count(), "Simplified geometry");
    simplified
}

fn is_usable(geometry: &Geometry) -> bool {
    let line_ok = |line: &Vec<[f64; 2]>| line.len() >= 2;
    let ring_ok = |ring: &Vec<[f64; 2]>| ring.len() >= 4;

    let mut finite = true;
    geometry.for_each_coordinate(|c| finite &= c[0].is_finite() && c[1].is_finite());
    if !finite {
        return false;
    }

    match geometry {
        Geometry::LineString { coordinates } => line_ok(coordinates),
        Geometry::MultiLineString { coordinates } => {
            !coordinates.is_empty() && coordinates.iter().all(line_ok)
        }
        Geometry::Polygon { coordinates } => !coordinates.is_empty() && coordinates.iter().all(ring_ok),
        Geometry::MultiPolygon { coordinates } => {
            !coordinates.is_empty()
                && coordinates.iter().all(|p| !p.is_empty() && p.iter().all(ring_ok))
        }
        Geometry::Point { .. } | Geometry::MultiPoint { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Closed ring around (13.5, 47.5) with `n` slightly jittered vertices
    fn wobbly_ring(n: usize) -> Vec<[f64; 2]> {
        let mut ring: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let angle = i as f64 / n as f64 * std::f64::consts::TAU;
                let radius = 0.1 + if i % 2 == 0 { 0.00001 } else { -0.00001 };
                [13.5 + radius * angle.cos(), 47.5 + radius * angle.sin()]
            })
            .collect();
        ring.push(ring[0]);
        ring
    }

    #[test]
    fn test_simplify_reduces_dense_polygon() {
        let polygon = Geometry::polygon(vec![wobbly_ring(2000)]);
        let simplified = simplify_if_complex(&polygon, 1000, 0.0001);

        assert!(simplified.vertex_count() < polygon.vertex_count());
        assert!(simplified.vertex_count() >= 4);
        assert_eq!(simplified.geometry_type(), polygon.geometry_type());
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let polygon = Geometry::polygon(vec![wobbly_ring(400)]);
        assert_eq!(simplify_if_complex(&polygon, 500, 0.0001), polygon);
    }

    #[test]
    fn test_points_are_never_simplified() {
        let point = Geometry::point(13.5, 47.5);
        assert_eq!(simplify(&point, 1.0), point);
    }

    #[test]
    fn test_collapsing_line_falls_back_to_original() {
        // A closed line collapses to its repeated endpoint under a huge tolerance
        let geometry = Geometry::line_string(vec![[13.6, 47.5], [13.5, 47.6], [13.4, 47.5], [13.6, 47.5]]);
        let simplified = simplify(&geometry, 10.0);
        assert!(simplified.vertex_count() >= 2);

        let tiny_ring = Geometry::polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]);
        let collapsed = simplify(&tiny_ring, 100.0);
        assert!(collapsed.vertex_count() >= 4);
    }

    #[test]
    fn test_invalid_tolerance_returns_original() {
        let line = Geometry::line_string(vec![[0.0, 0.0], [0.5, 0.001], [1.0, 0.0]]);
        assert_eq!(simplify(&line, 0.0), line);
        assert_eq!(simplify(&line, f64::NAN), line);
        assert_ne!(simplify(&line, 0.01), line);
    }

    proptest! {
        #[test]
        fn prop_simplify_never_adds_vertices(
            points in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 2..200),
            tolerance in 0.000001f64..5.0,
        ) {
            let line = Geometry::line_string(points.iter().map(|&(x, y)| [x, y]).collect());
            let simplified = simplify(&line, tolerance);
            prop_assert!(simplified.vertex_count() <= line.vertex_count());
        }

        #[test]
        fn prop_polygon_stays_usable(n in 8usize..300, tolerance in 0.000001f64..1.0) {
            let polygon = Geometry::polygon(vec![wobbly_ring(n)]);
            let simplified = simplify(&polygon, tolerance);
            prop_assert!(simplified.vertex_count() <= polygon.vertex_count());
            prop_assert!(simplified.vertex_count() >= 4);
        }
    }
}
