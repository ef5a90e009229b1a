//! PostgreSQL/PostGIS storage adapter

pub mod config;
mod features;
pub mod migrations;

pub use config::{ConfigError, PoolConfig, PostgresConfig};
pub use migrations::{MigrationError, MigrationManager, MigrationStatus};

use async_trait::async_trait;
use atlas_core::error::{AtlasError, Result};
use atlas_core::models::{Category, StoreRecord, UpsertOutcome};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::ports::FeatureStore;

/// Feature store backed by a single PostGIS `features` table
pub struct PostgresStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresStore {
    /// Connect, verify the connection and, if configured, apply migrations
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        config.validate().map_err(|e| AtlasError::ConfigInvalid {
            key: "database_url".to_string(),
            reason: e.to_string(),
        })?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .idle_timeout(config.pool.idle_timeout)
            .max_lifetime(config.pool.max_lifetime)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                AtlasError::StoreUnavailable(format!("{}: {}", config.redacted_url(), e))
            })?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| AtlasError::StoreUnavailable(format!("Connection test failed: {}", e)))?;

        let store = Self { pool, config };
        store.ensure_schema().await?;

        tracing::info!("Connected to {}", store.config.redacted_url());
        Ok(store)
    }

    /// Apply pending migrations, or refuse to run against an outdated schema
    /// when migrations are disabled
    async fn ensure_schema(&self) -> Result<()> {
        let manager = MigrationManager::new(self.pool.clone());
        let pending = manager.pending().await.map_err(migration_failed)?;
        if pending.is_empty() {
            return Ok(());
        }

        if !self.config.run_migrations {
            let versions: Vec<String> = pending.iter().map(|m| m.version.to_string()).collect();
            return Err(AtlasError::StoreUnavailable(format!(
                "Schema is missing migration(s) {}; enable run_migrations or migrate manually",
                versions.join(", ")
            )));
        }

        for migration in &pending {
            tracing::info!("Applying migration {} ({})", migration.version, migration.description);
        }
        manager.run_migrations().await.map_err(migration_failed)
    }

    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        MigrationManager::new(self.pool.clone()).check_status().await.map_err(migration_failed)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

#[async_trait]
impl FeatureStore for PostgresStore {
    async fn clear(&self, categories: &[Category]) -> Result<u64> {
        features::clear(&self.pool, categories).await
    }

    async fn upsert(&self, record: &StoreRecord) -> Result<UpsertOutcome> {
        features::upsert(&self.pool, record).await
    }

    async fn count(&self, category: Category) -> Result<u64> {
        features::count(&self.pool, category).await
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AtlasError::StoreUnavailable(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}

fn migration_failed(e: MigrationError) -> AtlasError {
    AtlasError::StoreUnavailable(e.to_string())
}

/// Map a sqlx error onto the store error taxonomy
pub(crate) fn classify_sqlx_error(e: sqlx::Error) -> AtlasError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Protocol(_) => AtlasError::StoreTransient(e.to_string()),
        sqlx::Error::Database(db) => {
            // SQLSTATE classes 08 connection, 40 rollback, 53 resources, 57P operator intervention
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if ["08", "40", "53", "57P"].iter().any(|class| code.starts_with(class)) {
                AtlasError::StoreTransient(e.to_string())
            } else {
                AtlasError::StoreRejected(e.to_string())
            }
        }
        _ => AtlasError::StoreRejected(e.to_string()),
    }
}
