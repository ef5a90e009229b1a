//! Area-of-interest construction from boundary sources

use atlas_core::formats::FormatRegistry;
use atlas_geo::{envelope_of, parse_geometry, AreaOfInterest, CoordinateNormalizer};
use std::path::Path;

/// Union of the WGS 84 envelopes of every readable boundary feature
///
/// Missing or unreadable sources are logged and ignored; with nothing loaded
/// the region stays unbounded and filtering accepts everything.
pub async fn load_area_of_interest(
    registry: &FormatRegistry,
    normalizer: &CoordinateNormalizer,
    sources: &[&Path],
) -> AreaOfInterest {
    let mut region = AreaOfInterest::unbounded();

    for path in sources {
        if !path.exists() {
            tracing::warn!("Boundary source not found: {}", path.display());
            continue;
        }

        let reader = match registry.detect_format(path) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("Cannot read boundary source {}: {}", path.display(), e);
                continue;
            }
        };
        let hint = reader.declared_crs(path);

        let mut stream = match reader.open(path).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Cannot read boundary source {}: {}", path.display(), e);
                continue;
            }
        };

        let mut used = 0usize;
        while let Some(item) = stream.next().await {
            let Ok(feature) = item else { continue };
            let Some(raw) = feature.geometry.as_ref() else { continue };

            let normalized = normalizer.normalize_with_hint(raw, hint);
            if normalized.unresolved > 0 {
                continue;
            }
            let Ok(geometry) = parse_geometry(&feature.id, Some(&normalized.geometry)) else {
                continue;
            };
            if let Some(envelope) = envelope_of(&geometry) {
                region.include(envelope);
                used += 1;
            }
        }

        if let Err(e) = stream.finish() {
            tracing::warn!("Boundary source {} ended early: {}", path.display(), e);
        }
        tracing::debug!("{} boundary feature(s) used from {}", used, path.display());
    }

    match region.envelope() {
        Some(e) => tracing::info!(
            "Area of interest: [{:.4}, {:.4}, {:.4}, {:.4}]",
            e.min_lng,
            e.min_lat,
            e.max_lng,
            e.max_lat
        ),
        None => tracing::warn!("No boundary sources loaded, area-of-interest filtering disabled"),
    }

    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::models::Envelope;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_envelopes_of_all_boundaries_are_unioned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("states.geojson");
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "a"},
                 "geometry": {"type": "Polygon", "coordinates": [[[13.0, 47.0], [14.0, 47.0], [14.0, 48.0], [13.0, 47.0]]]}},
                {"type": "Feature", "properties": {"name": "b"},
                 "geometry": {"type": "Polygon", "coordinates": [[[13.5, 47.5], [14.5, 47.5], [14.5, 48.5], [13.5, 47.5]]]}},
                {"type": "Feature", "properties": {"name": "broken"}, "geometry": null}
            ]}"#,
        )
        .unwrap();

        let region = load_area_of_interest(
            &FormatRegistry::with_defaults(),
            &CoordinateNormalizer::austrian(),
            &[path.as_path()],
        )
        .await;

        assert_eq!(region.envelope(), Some(Envelope::new(13.0, 47.0, 14.5, 48.5)));
    }

    #[tokio::test]
    async fn test_missing_boundaries_leave_region_unbounded() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nowhere.shp");

        let region = load_area_of_interest(
            &FormatRegistry::with_defaults(),
            &CoordinateNormalizer::austrian(),
            &[missing.as_path()],
        )
        .await;

        assert!(!region.is_bounded());
        assert!(region.accepts_point(-120.0, 10.0));
    }
}
