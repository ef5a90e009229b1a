//! Error types for the atlas importer

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    // Source errors
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Unsupported format: .{extension} (supported: {})", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("{format} error: {message}")]
    FormatError { format: String, message: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    // Feature errors
    #[error("Invalid geometry at feature {feature_id}: {reason}")]
    InvalidGeometry {
        feature_id: String,
        reason: String,
    },

    #[error("No candidate CRS resolved {unresolved} coordinate pair(s) of feature {feature_id}")]
    UnresolvedCrs {
        feature_id: String,
        unresolved: usize,
    },

    #[error("Invalid attribute {field} at feature {feature_id}: {reason}")]
    InvalidAttribute {
        feature_id: String,
        field: String,
        reason: String,
    },

    // Projection errors
    #[error("Failed to build projection from {from} to {to}: {reason}")]
    Projection {
        from: String,
        to: String,
        reason: String,
    },

    // Store errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transient store failure: {0}")]
    StoreTransient(String),

    #[error("Store write rejected: {0}")]
    StoreRejected(String),

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AtlasError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AtlasError::StoreTransient(_))
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
