//! Conversions between canonical geometries and the `geo` crate.

use geo::{Coord, Geometry as GeoGeometry, LineString, Polygon};

pub use atlas_core::models::{Crs, Envelope, Geometry, GeometryType, ValidityMode};

fn line(coords: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(coords.iter().map(|c| Coord { x: c[0], y: c[1] }).collect())
}

fn polygon(rings: &[Vec<[f64; 2]>]) -> Polygon<f64> {
    match rings.split_first() {
        Some((exterior, interiors)) => {
            Polygon::new(line(exterior), interiors.iter().map(|r| line(r)).collect())
        }
        None => Polygon::new(LineString::new(vec![]), vec![]),
    }
}

fn coords(ls: &LineString<f64>) -> Vec<[f64; 2]> {
    ls.coords().map(|c| [c.x, c.y]).collect()
}

fn rings(p: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(p.exterior()).chain(p.interiors()).map(coords).collect()
}

/// Convert a canonical Geometry to a geo::Geometry
pub fn to_geo_geometry(geom: &Geometry) -> GeoGeometry<f64> {
    match geom {
        Geometry::Point { coordinates } => {
            GeoGeometry::Point(geo::Point::new(coordinates[0], coordinates[1]))
        }
        Geometry::LineString { coordinates } => GeoGeometry::LineString(line(coordinates)),
        Geometry::Polygon { coordinates } => GeoGeometry::Polygon(polygon(coordinates)),
        Geometry::MultiPoint { coordinates } => GeoGeometry::MultiPoint(
            coordinates.iter().map(|c| geo::Point::new(c[0], c[1])).collect(),
        ),
        Geometry::MultiLineString { coordinates } => GeoGeometry::MultiLineString(
            geo::MultiLineString::new(coordinates.iter().map(|l| line(l)).collect()),
        ),
        Geometry::MultiPolygon { coordinates } => GeoGeometry::MultiPolygon(
            geo::MultiPolygon::new(coordinates.iter().map(|p| polygon(p)).collect()),
        ),
    }
}

/// Convert a geo::Geometry back to a canonical Geometry
///
/// Returns None for geometry collections, which the store schema has no slot for.
pub fn from_geo_geometry(geom: &GeoGeometry<f64>) -> Option<Geometry> {
    let geometry = match geom {
        GeoGeometry::Point(p) => Geometry::Point { coordinates: [p.x(), p.y()] },
        GeoGeometry::Line(l) => Geometry::LineString {
            coordinates: vec![[l.start.x, l.start.y], [l.end.x, l.end.y]],
        },
        GeoGeometry::LineString(ls) => Geometry::LineString { coordinates: coords(ls) },
        GeoGeometry::Polygon(p) => Geometry::Polygon { coordinates: rings(p) },
        GeoGeometry::MultiPoint(mp) => Geometry::MultiPoint {
            coordinates: mp.iter().map(|p| [p.x(), p.y()]).collect(),
        },
        GeoGeometry::MultiLineString(mls) => Geometry::MultiLineString {
            coordinates: mls.iter().map(coords).collect(),
        },
        GeoGeometry::MultiPolygon(mp) => Geometry::MultiPolygon {
            coordinates: mp.iter().map(rings).collect(),
        },
        GeoGeometry::Rect(r) => Geometry::Polygon { coordinates: rings(&r.to_polygon()) },
        GeoGeometry::Triangle(t) => Geometry::Polygon { coordinates: rings(&t.to_polygon()) },
        GeoGeometry::GeometryCollection(_) => return None,
    };
    Some(geometry)
}
