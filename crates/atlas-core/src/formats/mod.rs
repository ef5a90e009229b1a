//! Format abstraction layer for source files
//!
//! Each source format implements the `FormatReader` trait, and the `FormatRegistry`
//! manages format detection and dispatching to the appropriate reader. Readers hand
//! features out through a bounded [`FeatureStream`] so large files are never fully
//! materialized before the import starts consuming them.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use crate::error::{AtlasError, Result};
use crate::models::SourceFeature;

pub mod csv;
pub mod geojson;
pub mod shapefile;
pub mod validation;

pub use self::csv::CsvFormatReader;
pub use self::geojson::GeoJsonReader;
pub use self::shapefile::ShapefileFormatReader;

/// Features buffered between the blocking reader task and the consumer
pub const STREAM_BUFFER: usize = 256;

/// Format reader trait that all source formats implement
#[async_trait]
pub trait FormatReader: Send + Sync {
    /// Start reading the file, yielding features as they are decoded
    ///
    /// Fails up front when the file (or a required component) is missing or the
    /// header cannot be parsed. Per-feature decode failures are yielded in-stream.
    async fn open(&self, path: &Path) -> Result<FeatureStream>;

    /// Read the whole file into memory
    async fn read(&self, path: &Path) -> Result<FormatDataset> {
        let mut stream = self.open(path).await?;
        let mut features = Vec::new();
        while let Some(feature) = stream.next().await {
            features.push(feature?);
        }
        stream.finish()?;

        Ok(FormatDataset {
            name: dataset_name(path),
            format_name: self.format_name().to_string(),
            declared_crs: self.declared_crs(path),
            features,
        })
    }

    /// Get supported file extensions (e.g., ["shp"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "Shapefile", "GeoJSON")
    fn format_name(&self) -> &str;

    /// Validate file structure without a full read
    async fn validate(&self, _path: &Path) -> Result<FormatValidation> {
        Ok(FormatValidation::default())
    }

    /// EPSG code the file declares for its coordinates, if any
    fn declared_crs(&self, _path: &Path) -> Option<u32> {
        None
    }
}

/// Result of format validation
#[derive(Debug, Clone, Default)]
pub struct FormatValidation {
    /// Validation errors that prevent reading
    pub errors: Vec<String>,

    /// Warnings that don't prevent reading but indicate potential issues
    pub warnings: Vec<String>,
}

impl FormatValidation {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Fully materialized file contents
#[derive(Debug, Clone)]
pub struct FormatDataset {
    /// Dataset name (file stem)
    pub name: String,

    pub format_name: String,

    pub declared_crs: Option<u32>,

    pub features: Vec<SourceFeature>,
}

/// Item carried from the decode task to the consumer
enum StreamItem {
    Feature(Result<SourceFeature>),
    Aborted(AtlasError),
}

/// Receiving end of a reader task
pub struct FeatureStream {
    rx: mpsc::Receiver<StreamItem>,
    aborted: Option<AtlasError>,
}

impl FeatureStream {
    /// Next decoded feature, or None once the file is exhausted or the read aborted
    ///
    /// A per-feature error leaves the stream usable. An error that stopped the
    /// decode loop ends the stream and is returned by [`FeatureStream::finish`].
    pub async fn next(&mut self) -> Option<Result<SourceFeature>> {
        match self.rx.recv().await? {
            StreamItem::Feature(item) => Some(item),
            StreamItem::Aborted(e) => {
                self.aborted = Some(e);
                None
            }
        }
    }

    /// Consume the drained stream, surfacing the error that ended the read early
    pub fn finish(self) -> Result<()> {
        match self.aborted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream over an in-memory list, used by tests and small inputs
    pub fn from_features(features: Vec<SourceFeature>) -> Self {
        let (tx, rx) = mpsc::channel(features.len().max(1));
        for feature in features {
            // Capacity matches the list, so this never fails
            let _ = tx.try_send(StreamItem::Feature(Ok(feature)));
        }
        Self { rx, aborted: None }
    }
}

/// Sending end handed to the blocking decode loop
pub struct FeatureSink {
    tx: mpsc::Sender<StreamItem>,
}

impl FeatureSink {
    /// Push one feature; returns false when the consumer has gone away
    pub fn emit(&self, feature: Result<SourceFeature>) -> bool {
        self.tx.blocking_send(StreamItem::Feature(feature)).is_ok()
    }
}

/// Run a synchronous decode loop on the blocking pool and stream its output
///
/// An error returned by `decode` ends the stream and is reported by
/// [`FeatureStream::finish`], apart from the per-feature errors it emitted.
pub fn spawn_reader<F>(decode: F) -> FeatureStream
where
    F: FnOnce(&FeatureSink) -> Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::task::spawn_blocking(move || {
        let sink = FeatureSink { tx };
        if let Err(e) = decode(&sink) {
            let _ = sink.tx.blocking_send(StreamItem::Aborted(e));
        }
    });
    FeatureStream { rx, aborted: None }
}

/// File stem used as dataset name
pub fn dataset_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string()
}

/// Central registry for format readers
///
/// The registry maintains a collection of format readers and provides
/// format detection based on file extensions.
pub struct FormatRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl FormatRegistry {
    /// Create a new empty format registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with every built-in reader
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ShapefileFormatReader));
        registry.register(Box::new(GeoJsonReader));
        registry.register(Box::new(CsvFormatReader::new()));
        registry
    }

    /// Register a format reader
    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    /// Detect format and return appropriate reader
    pub fn detect_format(&self, path: &Path) -> Result<&dyn FormatReader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| AtlasError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            })?;

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| AtlasError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Get list of all supported format extensions
    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }

}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockReader {
        extensions: Vec<&'static str>,
        name: &'static str,
    }

    #[async_trait]
    impl FormatReader for MockReader {
        async fn open(&self, _path: &Path) -> Result<FeatureStream> {
            Ok(FeatureStream::from_features(vec![SourceFeature {
                id: "0".to_string(),
                ..Default::default()
            }]))
        }

        fn supported_extensions(&self) -> &[&str] {
            &self.extensions
        }

        fn format_name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_format_registration() {
        let mut registry = FormatRegistry::new();
        assert!(registry.supported_formats().is_empty());

        registry.register(Box::new(MockReader { extensions: vec!["json", "geojson"], name: "GeoJSON" }));

        assert_eq!(registry.supported_formats(), vec!["json", "geojson"]);
    }

    #[test]
    fn test_format_detection() {
        let registry = FormatRegistry::with_defaults();

        assert_eq!(registry.detect_format(Path::new("a/Gemeinden.SHP")).unwrap().format_name(), "Shapefile");
        assert_eq!(registry.detect_format(Path::new("boundary.geojson")).unwrap().format_name(), "GeoJSON");
        assert_eq!(registry.detect_format(Path::new("emissions.csv")).unwrap().format_name(), "CSV");
    }

    #[test]
    fn test_unsupported_format() {
        let registry = FormatRegistry::with_defaults();
        let err = registry.detect_format(Path::new("emissions.xlsx")).err().unwrap();
        assert!(matches!(err, AtlasError::UnsupportedFormat { ref extension, .. } if extension == "xlsx"));

        assert!(registry.detect_format(Path::new("README")).is_err());
    }

    #[tokio::test]
    async fn test_default_read_drains_stream() {
        let reader = MockReader { extensions: vec!["mock"], name: "Mock" };
        let dataset = reader.read(Path::new("/tmp/layer.mock")).await.unwrap();

        assert_eq!(dataset.name, "layer");
        assert_eq!(dataset.format_name, "Mock");
        assert_eq!(dataset.declared_crs, None);
        assert_eq!(dataset.features.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_reader_reports_abort_on_finish() {
        let mut stream = spawn_reader(|sink| {
            sink.emit(Ok(SourceFeature { id: "1".to_string(), ..Default::default() }));
            sink.emit(Err(AtlasError::FormatError { format: "Mock".to_string(), message: "bad row".to_string() }));
            Err(AtlasError::FormatError { format: "Mock".to_string(), message: "truncated".to_string() })
        });

        assert_eq!(stream.next().await.unwrap().unwrap().id, "1");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());

        let err = stream.finish().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn test_spawn_reader_clean_finish() {
        let mut stream = spawn_reader(|sink| {
            sink.emit(Ok(SourceFeature { id: "1".to_string(), ..Default::default() }));
            Ok(())
        });

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.is_none());
        assert!(stream.finish().is_ok());
    }

    #[test]
    fn test_format_validation_flags() {
        let validation = FormatValidation { errors: vec![], warnings: vec!["No CRS specified".to_string()] };
        assert!(validation.is_valid());
        assert!(validation.has_warnings());
    }
}
