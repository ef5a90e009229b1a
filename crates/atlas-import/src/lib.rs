//! Atlas Import - the import orchestrator
//!
//! Reads every catalogue source, pushes each feature through normalization,
//! validation, area filtering and simplification, and upserts the result into
//! a [`atlas_store::FeatureStore`].

pub mod attributes;
pub mod catalog;
pub mod models;
pub mod pipeline;
pub mod region;

pub use attributes::{AttributeMapper, MappedAttributes};
pub use catalog::{Catalog, CategorySpec, SourceSpec};
pub use models::{CategoryCounts, FeatureOutcome, RunSummary};
pub use pipeline::{ImportObserver, ImportOptions, ImportPipeline, ImportSettings, ImportStage, NoopObserver};
pub use region::load_area_of_interest;
