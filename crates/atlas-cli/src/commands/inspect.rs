//! Inspect command implementation

use crate::cli::InspectArgs;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::InspectOutput;
use anyhow::{bail, Result};
use atlas_core::formats::csv::CsvFormatReader;
use atlas_core::formats::{FormatReader, FormatRegistry};
use atlas_core::models::{Crs, Envelope};
use atlas_geo::{envelope_of, parse_geometry, CoordinateNormalizer};
use std::collections::BTreeSet;

/// Read a source the way the importer would and report what it holds
pub async fn execute(args: InspectArgs, output: &OutputWriter) -> Result<()> {
    if !args.path.exists() {
        return Err(errors::source_not_found(&args.path.display().to_string()).into());
    }

    let registry = FormatRegistry::with_defaults();
    let tabular;
    let reader: &dyn FormatReader = match tabular_reader(&args)? {
        Some(reader) => {
            tabular = reader;
            &tabular
        }
        None => registry.detect_format(&args.path)?,
    };

    let validation = reader.validate(&args.path).await?;
    let declared_crs = reader.declared_crs(&args.path);
    let normalizer = CoordinateNormalizer::austrian();

    let mut report = InspectOutput {
        path: args.path.display().to_string(),
        format: reader.format_name().to_string(),
        feature_count: 0,
        features_without_geometry: 0,
        invalid_geometries: 0,
        declared_crs,
        detected_crs: None,
        envelope: None,
        geometry_types: Vec::new(),
        warnings: validation.warnings.clone(),
    };
    report.warnings.extend(validation.errors.iter().map(|e| format!("error: {}", e)));

    let mut envelope: Option<Envelope> = None;
    let mut geometry_types = BTreeSet::new();
    let mut unreadable = 0usize;
    let mut stream = reader.open(&args.path).await?;

    while let Some(item) = stream.next().await {
        let feature = match item {
            Ok(feature) => feature,
            Err(e) => {
                unreadable += 1;
                tracing::debug!("Unreadable feature: {}", e);
                continue;
            }
        };
        report.feature_count += 1;

        let Some(raw) = feature.geometry.as_ref() else {
            report.features_without_geometry += 1;
            continue;
        };
        if report.detected_crs.is_none() {
            report.detected_crs = normalizer.detect(raw, declared_crs);
        }

        let normalized = normalizer.normalize_with_hint(raw, declared_crs);
        match parse_geometry(&feature.id, Some(&normalized.geometry)) {
            Ok(geometry) => {
                geometry_types.insert(format!("{:?}", geometry.geometry_type()));
                if let Some(bounds) = envelope_of(&geometry) {
                    envelope = Some(envelope.map_or(bounds, |e| e.union(&bounds)));
                }
            }
            Err(_) => report.invalid_geometries += 1,
        }
    }

    if unreadable > 0 {
        report.warnings.push(format!("{} record(s) could not be decoded", unreadable));
    }
    if let Err(e) = stream.finish() {
        report.warnings.push(format!("reading stopped early: {}", e));
    }
    report.envelope = envelope.map(|e| e.to_array());
    report.geometry_types = geometry_types.into_iter().collect();

    if output.is_json() {
        return output.result(&report);
    }

    output.section(format!("Source: {}", report.path));
    output.kv("Format", &report.format);
    output.kv("Features", report.feature_count);
    output.kv("Geometry types", report.geometry_types.join(", "));
    output.kv("Declared CRS", crs_label(report.declared_crs));
    output.kv("Detected CRS", crs_label(report.detected_crs));
    if let Some([min_lng, min_lat, max_lng, max_lat]) = report.envelope {
        output.kv("Extent (WGS84)", format!("{min_lng:.5}, {min_lat:.5} .. {max_lng:.5}, {max_lat:.5}"));
    }
    if report.features_without_geometry > 0 {
        output.warning(format!("{} feature(s) have no geometry", report.features_without_geometry));
    }
    if report.invalid_geometries > 0 {
        output.warning(format!("{} feature(s) have invalid geometry", report.invalid_geometries));
    }
    for warning in &report.warnings {
        output.warning(warning);
    }

    Ok(())
}

/// CSV reader when point columns or a delimiter were given, else None
fn tabular_reader(args: &InspectArgs) -> Result<Option<CsvFormatReader>> {
    if args.x_column.is_none() && args.delimiter.is_none() {
        return Ok(None);
    }

    let mut reader = CsvFormatReader::new();
    if let (Some(x), Some(y)) = (&args.x_column, &args.y_column) {
        reader = reader.with_point_columns(x.clone(), y.clone());
    }
    if let Some(delimiter) = args.delimiter {
        if !delimiter.is_ascii() {
            bail!("Delimiter must be a single ASCII character, got '{}'", delimiter);
        }
        reader = reader.with_delimiter(delimiter as u8);
    }
    Ok(Some(reader))
}

fn crs_label(epsg: Option<u32>) -> String {
    match epsg {
        Some(code) => match Crs::from_epsg(code) {
            Some(crs) => format!("EPSG:{} ({})", code, crs.name),
            None => format!("EPSG:{}", code),
        },
        None => "unknown".to_string(),
    }
}
