//! Shapefile format reader
//!
//! A Shapefile is a set of component files (.shp, .shx, .dbf, optional .prj).
//! Geometry is read in 2D only: Z and M values are dropped. The .prj file, when
//! present, is used to derive a CRS hint for the normalizer.

use async_trait::async_trait;
use serde_json::{json, Value};
use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{Point, PolygonRing, Reader as ShapefileReader, Shape};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{spawn_reader, FeatureStream, FormatReader, FormatValidation};
use crate::models::{AttributeMap, SourceFeature};

const FORMAT_NAME: &str = "Shapefile";

/// Shapefile format reader
pub struct ShapefileFormatReader;

#[async_trait]
impl FormatReader for ShapefileFormatReader {
    async fn open(&self, path: &Path) -> Result<FeatureStream> {
        if !path.exists() {
            return Err(AtlasError::SourceMissing { path: path.to_path_buf() });
        }
        self.verify_components(path)?;

        let mut reader = ShapefileReader::from_path(path).map_err(|e| format_error(format!(
            "Failed to open {}: {}",
            path.display(),
            e
        )))?;

        Ok(spawn_reader(move |sink| {
            for (index, result) in reader.iter_shapes_and_records().enumerate() {
                // A broken record usually means the rest of the file is unreadable too
                let (shape, record) =
                    result.map_err(|e| format_error(format!("Failed to read record {}: {}", index, e)))?;
                let feature = SourceFeature {
                    id: index.to_string(),
                    geometry: shape_to_geojson(&shape, index),
                    properties: record_properties(record),
                };

                if !sink.emit(Ok(feature)) {
                    break;
                }
            }
            Ok(())
        }))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let mut validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let base = match self.shapefile_base(path) {
            Ok(b) => b,
            Err(e) => {
                validation.errors.push(format!("Invalid Shapefile path: {}", e));
                return Ok(validation);
            }
        };

        let component_validation =
            FormatValidator::validate_component_files(&base, &["shp", "shx", "dbf"], &["prj"]);
        let size_validation = FormatValidator::validate_file_size(path);

        let mut merged = FormatValidator::merge_validations(vec![
            validation,
            component_validation,
            size_validation,
        ]);
        if base.with_extension("prj").exists() && self.declared_crs(path).is_none() {
            merged
                .warnings
                .push("Projection file present but its CRS is not recognized".to_string());
        }
        Ok(merged)
    }

    fn declared_crs(&self, path: &Path) -> Option<u32> {
        let prj_path = self.shapefile_base(path).ok()?.with_extension("prj");
        let wkt = fs::read_to_string(prj_path).ok()?;
        crs_from_prj(&wkt)
    }
}

impl ShapefileFormatReader {
    /// Get the base path for a Shapefile (without extension)
    fn shapefile_base(&self, path: &Path) -> Result<PathBuf> {
        let is_shp = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if !is_shp {
            return Err(AtlasError::InvalidPath {
                path: path.to_path_buf(),
                reason: "Not a Shapefile (.shp)".to_string(),
            });
        }

        Ok(path.with_extension(""))
    }

    /// Verify that all required Shapefile component files exist
    fn verify_components(&self, path: &Path) -> Result<()> {
        let base = self.shapefile_base(path)?;
        let missing: Vec<String> = ["shp", "shx", "dbf"]
            .iter()
            .filter(|ext| !base.with_extension(ext).exists())
            .map(|ext| format!(".{}", ext))
            .collect();

        if !missing.is_empty() {
            return Err(format_error(format!(
                "Missing required component files: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }
}

fn format_error(message: String) -> AtlasError {
    AtlasError::FormatError { format: FORMAT_NAME.to_string(), message }
}

/// Derive an EPSG code from the WKT in a .prj file
///
/// The last EPSG authority wins, since nested datum and spheroid authorities
/// precede the one for the CRS itself. ESRI-flavoured files carry no authority,
/// so the CRS name is matched against the known Austrian systems.
pub fn crs_from_prj(wkt: &str) -> Option<u32> {
    if let Some(code) = last_epsg_authority(wkt) {
        return Some(code);
    }

    let name = wkt.split('"').nth(1)?.to_ascii_lowercase().replace([' ', '/', '-'], "_");

    if name.contains("austria_lambert") {
        if name.contains("etrs") {
            Some(3416)
        } else {
            Some(31287)
        }
    } else if name.contains("gk_east") || name.contains("gk_ost") {
        Some(31256)
    } else if name.contains("wgs_1984") || name.contains("wgs_84") {
        Some(4326)
    } else {
        None
    }
}

fn last_epsg_authority(wkt: &str) -> Option<u32> {
    const MARKER: &str = "AUTHORITY[\"EPSG\",\"";

    let start = wkt.rfind(MARKER)? + MARKER.len();
    let digits: String = wkt[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn xy<'a, P: HasXY + 'a>(points: impl IntoIterator<Item = &'a P>) -> Vec<[f64; 2]> {
    points.into_iter().map(|p| p.xy()).collect()
}

/// 2D view over the three shapefile point flavours
trait HasXY {
    fn xy(&self) -> [f64; 2];
}

impl HasXY for Point {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl HasXY for shapefile::PointM {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl HasXY for shapefile::PointZ {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

fn lines_to_geojson(parts: Vec<Vec<[f64; 2]>>) -> Value {
    if parts.len() == 1 {
        json!({ "type": "LineString", "coordinates": parts[0] })
    } else {
        json!({ "type": "MultiLineString", "coordinates": parts })
    }
}

/// Group rings into polygons: every outer ring opens a polygon, inner rings
/// attach to the most recent one
fn rings_to_geojson<P: HasXY>(rings: &[PolygonRing<P>]) -> Value {
    let mut polygons: Vec<Vec<Vec<[f64; 2]>>> = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(vec![xy(points)]),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(polygon) => polygon.push(xy(points)),
                None => polygons.push(vec![xy(points)]),
            },
        }
    }

    if polygons.len() == 1 {
        json!({ "type": "Polygon", "coordinates": polygons[0] })
    } else {
        json!({ "type": "MultiPolygon", "coordinates": polygons })
    }
}

/// Convert a shape to a GeoJSON geometry value, None for null and unsupported shapes
fn shape_to_geojson(shape: &Shape, index: usize) -> Option<Value> {
    let geometry = match shape {
        Shape::NullShape => return None,
        Shape::Point(p) => json!({ "type": "Point", "coordinates": p.xy() }),
        Shape::PointM(p) => json!({ "type": "Point", "coordinates": p.xy() }),
        Shape::PointZ(p) => json!({ "type": "Point", "coordinates": p.xy() }),
        Shape::Polyline(line) => lines_to_geojson(line.parts().iter().map(|p| xy(p)).collect()),
        Shape::PolylineM(line) => lines_to_geojson(line.parts().iter().map(|p| xy(p)).collect()),
        Shape::PolylineZ(line) => lines_to_geojson(line.parts().iter().map(|p| xy(p)).collect()),
        Shape::Polygon(polygon) => rings_to_geojson(polygon.rings()),
        Shape::PolygonM(polygon) => rings_to_geojson(polygon.rings()),
        Shape::PolygonZ(polygon) => rings_to_geojson(polygon.rings()),
        Shape::Multipoint(mp) => json!({ "type": "MultiPoint", "coordinates": xy(mp.points()) }),
        Shape::MultipointM(mp) => json!({ "type": "MultiPoint", "coordinates": xy(mp.points()) }),
        Shape::MultipointZ(mp) => json!({ "type": "MultiPoint", "coordinates": xy(mp.points()) }),
        Shape::Multipatch(_) => {
            tracing::warn!(record = index, "Multipatch geometry is not supported");
            return None;
        }
    };
    Some(geometry)
}

fn record_properties(record: shapefile::dbase::Record) -> AttributeMap {
    let mut fields: Vec<(String, DbaseFieldValue)> = record.into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields.into_iter().map(|(name, value)| (name, dbase_value_to_json(value))).collect()
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a dBase field value to JSON; blank text becomes null
fn dbase_value_to_json(value: DbaseFieldValue) -> Value {
    match value {
        DbaseFieldValue::Character(Some(s)) | DbaseFieldValue::Memo(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        DbaseFieldValue::Numeric(Some(n)) => number(n),
        DbaseFieldValue::Float(Some(f)) => number(f as f64),
        DbaseFieldValue::Double(d) | DbaseFieldValue::Currency(d) => number(d),
        DbaseFieldValue::Integer(i) => Value::Number(i.into()),
        DbaseFieldValue::Logical(Some(b)) => Value::Bool(b),
        DbaseFieldValue::Date(Some(date)) => {
            Value::String(format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()))
        }
        DbaseFieldValue::DateTime(dt) => {
            let date = dt.date();
            Value::String(format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()))
        }
        DbaseFieldValue::Character(None)
        | DbaseFieldValue::Numeric(None)
        | DbaseFieldValue::Float(None)
        | DbaseFieldValue::Logical(None)
        | DbaseFieldValue::Date(None) => Value::Null,
    }
}
