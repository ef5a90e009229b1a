//! GeoJSON format reader
//!
//! Features are walked as plain JSON rather than through `geojson::GeoJson`, so a
//! single malformed geometry reaches the geometry validator instead of failing
//! the whole file. Coordinates are passed through untouched: files exported from
//! Austrian GIS tools often carry projected metres despite the format's WGS 84
//! convention.

use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{AtlasError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{spawn_reader, FeatureStream, FormatReader, FormatValidation};
use crate::models::{AttributeMap, SourceFeature};

const FORMAT_NAME: &str = "GeoJSON";

/// GeoJSON format reader
pub struct GeoJsonReader;

#[async_trait]
impl FormatReader for GeoJsonReader {
    async fn open(&self, path: &Path) -> Result<FeatureStream> {
        let document = load_document(path)?;
        let features = extract_features(document)?;

        Ok(spawn_reader(move |sink| {
            for feature in features {
                if !sink.emit(Ok(feature)) {
                    break;
                }
            }
            Ok(())
        }))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json", "geojson"]
    }

    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let json_validation = FormatValidator::validate_json_structure(path);
        let mut strict = FormatValidation::default();

        if json_validation.is_valid() {
            match fs::read_to_string(path) {
                Ok(content) => {
                    // Malformed features are skipped during import, so a strict parse failure only warns
                    if let Err(e) = content.parse::<geojson::GeoJson>() {
                        strict.warnings.push(format!("Not strictly valid GeoJSON: {}", e));
                    }
                }
                Err(e) => strict.errors.push(format!("Cannot read file: {}", e)),
            }
        }

        Ok(FormatValidator::merge_validations(vec![
            validation,
            json_validation,
            FormatValidator::validate_file_size(path),
            strict,
        ]))
    }

    fn declared_crs(&self, path: &Path) -> Option<u32> {
        let document = load_document(path).ok()?;
        document.get("crs").and_then(extract_epsg_from_crs)
    }
}

fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(AtlasError::SourceMissing { path: path.to_path_buf() });
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| AtlasError::FormatError {
        format: FORMAT_NAME.to_string(),
        message: format!("Failed to parse {}: {}", path.display(), e),
    })
}

/// Flatten a FeatureCollection, Feature or bare geometry into source features
fn extract_features(document: Value) -> Result<Vec<SourceFeature>> {
    match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let Some(Value::Array(features)) = document.get("features") else {
                return Err(AtlasError::FormatError {
                    format: FORMAT_NAME.to_string(),
                    message: "FeatureCollection without a features array".to_string(),
                });
            };
            Ok(features.iter().enumerate().map(|(idx, f)| convert_feature(f, idx)).collect())
        }
        Some("Feature") => Ok(vec![convert_feature(&document, 0)]),
        Some(_) => Ok(vec![SourceFeature {
            id: "0".to_string(),
            geometry: Some(document),
            properties: AttributeMap::new(),
        }]),
        None => Err(AtlasError::FormatError {
            format: FORMAT_NAME.to_string(),
            message: "Document has no type member".to_string(),
        }),
    }
}

fn convert_feature(feature: &Value, idx: usize) -> SourceFeature {
    let id = match feature.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => idx.to_string(),
    };

    let geometry = feature.get("geometry").filter(|g| !g.is_null()).cloned();

    let properties = match feature.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        _ => AttributeMap::new(),
    };

    SourceFeature { id, geometry, properties }
}

/// Extract an EPSG code from a legacy named `crs` member
///
/// Accepts "EPSG:31287" and "urn:ogc:def:crs:EPSG::31287"; CRS84 maps to 4326.
fn extract_epsg_from_crs(crs: &Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.parse().ok()
}
