//! Canonical geometry types used across all atlas crates.
//!
//! These types provide a bridge between GeoJSON serialization and the
//! computational geo crate types. A `Geometry` value is only constructed from
//! coordinates that already passed structural validation, so every pair is
//! two finite numbers.

use serde::{Deserialize, Serialize};

/// EPSG code of WGS 84, the only CRS the store accepts
pub const WGS84_EPSG: u32 = 4326;

/// Coordinate Reference System identified by EPSG code
///
/// Projected systems carry a PROJ definition string that is enough to drive a
/// forward transform into WGS 84 without a PROJ database lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
    pub definition: Option<String>,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into(), definition: None }
    }

    /// Attach a PROJ definition string
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(WGS84_EPSG, "WGS 84")
    }

    /// MGI / Austria Lambert (EPSG:31287)
    pub fn mgi_austria_lambert() -> Self {
        Self::new(31287, "MGI / Austria Lambert").with_definition(
            "+proj=lcc +lat_0=47.5 +lon_0=13.3333333333333 +lat_1=49 +lat_2=46 \
             +x_0=400000 +y_0=400000 +ellps=bessel \
             +towgs84=577.326,90.129,463.919,5.137,1.474,5.297,2.4232 +units=m +no_defs +type=crs",
        )
    }

    /// ETRS89 / Austria Lambert (EPSG:3416)
    pub fn etrs89_austria_lambert() -> Self {
        Self::new(3416, "ETRS89 / Austria Lambert").with_definition(
            "+proj=lcc +lat_0=47.5 +lon_0=13.3333333333333 +lat_1=49 +lat_2=46 \
             +x_0=400000 +y_0=400000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs",
        )
    }

    /// MGI / Austria GK East (EPSG:31256)
    pub fn mgi_austria_gk_east() -> Self {
        Self::new(31256, "MGI / Austria GK East").with_definition(
            "+proj=tmerc +lat_0=0 +lon_0=16.3333333333333 +k=1 +x_0=0 +y_0=-5000000 \
             +ellps=bessel +towgs84=577.326,90.129,463.919,5.137,1.474,5.297,2.4232 \
             +units=m +no_defs +type=crs",
        )
    }

    /// The fixed Austrian systems, in the order they are tried
    pub fn austrian_candidates() -> Vec<Crs> {
        vec![Self::mgi_austria_lambert(), Self::etrs89_austria_lambert(), Self::mgi_austria_gk_east()]
    }

    /// Look up one of the known systems by EPSG code
    pub fn from_epsg(epsg: u32) -> Option<Crs> {
        match epsg {
            WGS84_EPSG => Some(Self::wgs84()),
            31287 => Some(Self::mgi_austria_lambert()),
            3416 => Some(Self::etrs89_austria_lambert()),
            31256 => Some(Self::mgi_austria_gk_east()),
            _ => None,
        }
    }

    /// Source definition handed to PROJ
    pub fn proj_definition(&self) -> String {
        self.definition.clone().unwrap_or_else(|| format!("EPSG:{}", self.epsg))
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg == WGS84_EPSG
    }
}

/// Geometry validation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidityMode {
    /// Skip features whose coordinates no candidate CRS could resolve
    Strict,
    /// Keep unresolved coordinates as they were read
    #[default]
    Lenient,
}

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeometryType {
    #[default]
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryType {
    /// Parse a GeoJSON `type` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Point" => Some(GeometryType::Point),
            "LineString" => Some(GeometryType::LineString),
            "Polygon" => Some(GeometryType::Polygon),
            "MultiPoint" => Some(GeometryType::MultiPoint),
            "MultiLineString" => Some(GeometryType::MultiLineString),
            "MultiPolygon" => Some(GeometryType::MultiPolygon),
            _ => None,
        }
    }

    /// Nesting depth of the coordinates array above the leaf pairs
    pub fn coordinate_depth(&self) -> usize {
        match self {
            GeometryType::Point => 0,
            GeometryType::LineString | GeometryType::MultiPoint => 1,
            GeometryType::Polygon | GeometryType::MultiLineString => 2,
            GeometryType::MultiPolygon => 3,
        }
    }
}

/// GeoJSON-compatible geometry representation
///
/// This enum directly maps to GeoJSON geometry types with coordinate arrays.
/// It can be serialized/deserialized as GeoJSON and converted to/from `geo` crate types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Geometry {
    /// Create a Point geometry
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { coordinates: [x, y] }
    }

    /// Create a LineString geometry
    pub fn line_string(coords: Vec<[f64; 2]>) -> Self {
        Geometry::LineString { coordinates: coords }
    }

    /// Create a Polygon geometry
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    /// Get the geometry type
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::LineString { .. } => GeometryType::LineString,
            Geometry::Polygon { .. } => GeometryType::Polygon,
            Geometry::MultiPoint { .. } => GeometryType::MultiPoint,
            Geometry::MultiLineString { .. } => GeometryType::MultiLineString,
            Geometry::MultiPolygon { .. } => GeometryType::MultiPolygon,
        }
    }

    /// Visit every leaf coordinate pair in document order
    pub fn for_each_coordinate(&self, mut f: impl FnMut(&[f64; 2])) {
        match self {
            Geometry::Point { coordinates } => f(coordinates),
            Geometry::LineString { coordinates } | Geometry::MultiPoint { coordinates } => {
                coordinates.iter().for_each(f)
            }
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } => {
                coordinates.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().for_each(f)
            }
        }
    }

    /// Total number of leaf coordinate pairs across all parts and rings
    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        self.for_each_coordinate(|_| count += 1);
        count
    }

    /// Try to parse from a serde_json::Value (GeoJSON)
    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Convert to serde_json::Value (GeoJSON)
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Axis-aligned rectangle in WGS 84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Envelope {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self { min_lng, min_lat, max_lng, max_lat }
    }

    /// Widen to the per-component union with another envelope
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_lng: self.min_lng.min(other.min_lng),
            min_lat: self.min_lat.min(other.min_lat),
            max_lng: self.max_lng.max(other.max_lng),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Inclusive point-in-rectangle test
    pub fn contains_point(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Separating-axis rectangle intersection (touching edges intersect)
    pub fn intersects(&self, other: &Envelope) -> bool {
        !(self.max_lng < other.min_lng
            || self.min_lng > other.max_lng
            || self.max_lat < other.min_lat
            || self.min_lat > other.max_lat)
    }

    /// `[min_lng, min_lat, max_lng, max_lat]`, the GeoJSON bbox order
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }
}
