use crate::cli::StorageBackend;
use crate::errors;
use anyhow::Result;
use atlas_store::{FeatureStore, MemoryFeatureStore, PostgresConfig, PostgresStore};

/// Open the selected backend; failure to reach it aborts the run
pub async fn open_store(backend: StorageBackend) -> Result<Box<dyn FeatureStore>> {
    match backend {
        StorageBackend::Memory => Ok(Box::new(MemoryFeatureStore::new())),
        StorageBackend::Postgres => {
            let config = PostgresConfig::from_env()
                .map_err(|e| errors::database_connection_failed(&e.to_string(), None))?;

            let store = PostgresStore::connect(config.clone()).await.map_err(|e| {
                errors::database_connection_failed(&e.to_string(), Some(&config.redacted_url()))
            })?;

            Ok(Box::new(store))
        }
    }
}
