use async_trait::async_trait;
use atlas_core::error::Result;
use atlas_core::models::{Category, StoreRecord, UpsertOutcome};

/// Port for the spatial feature store the importer writes into
///
/// Records are grouped by category. A record with a natural key replaces any
/// existing record with the same (category, key); one without is appended.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Remove every record of the given categories, returning how many went
    async fn clear(&self, categories: &[Category]) -> Result<u64>;

    /// Insert or, for keyed records, overwrite all non-key fields
    async fn upsert(&self, record: &StoreRecord) -> Result<UpsertOutcome>;

    /// Number of stored records in a category
    async fn count(&self, category: Category) -> Result<u64>;

    /// Verify the store is reachable
    async fn health_check(&self) -> Result<()>;

    /// Short backend name for logs and summaries
    fn backend_name(&self) -> &str;
}

#[async_trait]
impl<T: FeatureStore + ?Sized> FeatureStore for Box<T> {
    async fn clear(&self, categories: &[Category]) -> Result<u64> {
        (**self).clear(categories).await
    }

    async fn upsert(&self, record: &StoreRecord) -> Result<UpsertOutcome> {
        (**self).upsert(record).await
    }

    async fn count(&self, category: Category) -> Result<u64> {
        (**self).count(category).await
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }

    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }
}
