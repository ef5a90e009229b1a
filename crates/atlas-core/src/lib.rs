//! Atlas Core - Domain models, source readers, and configuration
//!
//! This crate holds the types shared by every stage of the import: categories,
//! canonical geometries, store records, the layered configuration, and the
//! format readers that turn source files into streams of features.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

pub use error::{AtlasError, Result};
