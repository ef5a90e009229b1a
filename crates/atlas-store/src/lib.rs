//! Atlas Store - feature store port and adapters
//!
//! The importer writes through [`FeatureStore`]; [`MemoryFeatureStore`] backs
//! tests and dry runs, [`PostgresStore`] the real PostGIS schema.

pub mod memory;
pub mod ports;
pub mod postgres;
pub mod retry;

pub use memory::MemoryFeatureStore;
pub use ports::FeatureStore;
pub use postgres::{PostgresConfig, PostgresStore};
pub use retry::RetryPolicy;
