//! In-memory feature store for development, dry runs and tests.

use async_trait::async_trait;
use atlas_core::error::{AtlasError, Result};
use atlas_core::models::{Category, StoreRecord, UpsertOutcome};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ports::FeatureStore;

#[derive(Debug, Default)]
struct Tables {
    rows: Vec<StoreRecord>,
    /// (category, natural key) -> index into `rows`
    keys: HashMap<(Category, String), usize>,
}

impl Tables {
    fn reindex(&mut self) {
        self.keys = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.natural_key.clone().map(|k| ((r.category, k), i)))
            .collect();
    }
}

/// In-memory implementation of FeatureStore
#[derive(Debug, Clone, Default)]
pub struct MemoryFeatureStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryFeatureStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| AtlasError::StoreUnavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| AtlasError::StoreUnavailable("memory store lock poisoned".into()))
    }

    /// Snapshot of the records in a category, in insertion order
    pub fn records(&self, category: Category) -> Result<Vec<StoreRecord>> {
        Ok(self.read()?.rows.iter().filter(|r| r.category == category).cloned().collect())
    }

    /// Look up a keyed record
    pub fn get(&self, category: Category, natural_key: &str) -> Result<Option<StoreRecord>> {
        let tables = self.read()?;
        Ok(tables.keys.get(&(category, natural_key.to_string())).map(|&i| tables.rows[i].clone()))
    }

    /// Total number of records across all categories
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn clear(&self, categories: &[Category]) -> Result<u64> {
        let mut tables = self.write()?;
        let before = tables.rows.len();
        tables.rows.retain(|r| !categories.contains(&r.category));
        tables.reindex();
        Ok((before - tables.rows.len()) as u64)
    }

    async fn upsert(&self, record: &StoreRecord) -> Result<UpsertOutcome> {
        let mut tables = self.write()?;

        let existing = record
            .natural_key
            .as_ref()
            .and_then(|k| tables.keys.get(&(record.category, k.clone())).copied());

        match existing {
            Some(index) => {
                tables.rows[index] = record.clone();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let index = tables.rows.len();
                tables.rows.push(record.clone());
                if let Some(key) = &record.natural_key {
                    tables.keys.insert((record.category, key.clone()), index);
                }
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn count(&self, category: Category) -> Result<u64> {
        Ok(self.read()?.rows.iter().filter(|r| r.category == category).count() as u64)
    }

    async fn health_check(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
