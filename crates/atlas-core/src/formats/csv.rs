//! CSV format reader
//!
//! Tabular sources (spreadsheets exported to CSV) carry point locations in two
//! coordinate columns. When the reader is told which columns those are it builds
//! a Point geometry per row; a row whose coordinates do not parse gets no
//! geometry and is rejected later by the geometry validator.
//!
//! Austrian exports commonly use `;` as delimiter and `,` as decimal separator,
//! so both are accepted.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{AtlasError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{spawn_reader, FeatureStream, FormatReader, FormatValidation};
use crate::models::{AttributeMap, SourceFeature};

const FORMAT_NAME: &str = "CSV";

/// CSV format reader
#[derive(Debug, Clone, Default)]
pub struct CsvFormatReader {
    /// Field delimiter; sniffed from the header line when unset
    delimiter: Option<u8>,

    /// (longitude / easting, latitude / northing) column names
    point_columns: Option<(String, String)>,
}

impl CsvFormatReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_point_columns(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.point_columns = Some((x.into(), y.into()));
        self
    }

    fn resolve_delimiter(&self, path: &Path) -> Result<u8> {
        if let Some(delimiter) = self.delimiter {
            return Ok(delimiter);
        }
        let mut header = String::new();
        BufReader::new(File::open(path)?).read_line(&mut header)?;
        Ok(sniff_delimiter(&header))
    }
}

#[async_trait]
impl FormatReader for CsvFormatReader {
    async fn open(&self, path: &Path) -> Result<FeatureStream> {
        if !path.exists() {
            return Err(AtlasError::SourceMissing { path: path.to_path_buf() });
        }

        let delimiter = self.resolve_delimiter(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(csv_error)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_owned())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(AtlasError::FormatError {
                format: FORMAT_NAME.to_string(),
                message: format!("{} contains no header row", path.display()),
            });
        }

        let point_indices = match &self.point_columns {
            Some((x, y)) => Some((column_index(&headers, x)?, column_index(&headers, y)?)),
            None => None,
        };

        Ok(spawn_reader(move |sink| {
            for (index, result) in reader.records().enumerate() {
                let feature = result.map_err(csv_error).map(|record| {
                    let properties: AttributeMap = headers
                        .iter()
                        .enumerate()
                        .map(|(i, header)| (header.clone(), typed_value(record.get(i).unwrap_or(""))))
                        .collect();

                    let geometry = point_indices.and_then(|(xi, yi)| {
                        let x = parse_decimal(record.get(xi)?)?;
                        let y = parse_decimal(record.get(yi)?)?;
                        Some(json!({ "type": "Point", "coordinates": [x, y] }))
                    });

                    SourceFeature { id: index.to_string(), geometry, properties }
                });

                if !sink.emit(feature) {
                    break;
                }
            }
            Ok(())
        }))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let mut columns = FormatValidation::default();
        if let Some((x, y)) = &self.point_columns {
            let delimiter = self.resolve_delimiter(path)?;
            let headers = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .from_path(path)
                .and_then(|mut r| r.headers().cloned());
            match headers {
                Ok(headers) => {
                    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
                    for column in [x, y] {
                        if column_index(&headers, column).is_err() {
                            columns.errors.push(format!("Missing coordinate column: {}", column));
                        }
                    }
                }
                Err(e) => columns.errors.push(format!("Cannot read header row: {}", e)),
            }
        }

        Ok(FormatValidator::merge_validations(vec![
            validation,
            FormatValidator::validate_file_size(path),
            columns,
        ]))
    }
}

fn csv_error(e: csv::Error) -> AtlasError {
    AtlasError::FormatError { format: FORMAT_NAME.to_string(), message: e.to_string() }
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name)).ok_or_else(|| {
        AtlasError::FormatError {
            format: FORMAT_NAME.to_string(),
            message: format!("Column '{}' not found (columns: {})", name, headers.join(", ")),
        }
    })
}

/// Pick `;` over `,` when the header line has more of them
fn sniff_delimiter(header: &str) -> u8 {
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Parse a number that may use a decimal comma ("16,3738")
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: f64 = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replacen(',', ".", 1).parse().ok()?
    } else {
        trimmed.parse().ok()?
    };
    value.is_finite().then_some(value)
}

/// Convert a cell to a JSON scalar
///
/// Blank cells are null. Numeric-looking cells become numbers unless they carry
/// a leading zero, which marks a code (postal, municipality) that must stay text.
fn typed_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    let bytes = trimmed.as_bytes();
    let is_code = bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit();
    if is_code {
        return Value::String(trimmed.to_string());
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}
