//! Embedded schema migrations for the `features` table

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::collections::HashSet;
use thiserror::Error;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Failed(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One embedded migration and whether the database has it
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

pub struct MigrationManager {
    pool: PgPool,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), MigrationError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Every embedded migration, oldest first
    pub async fn check_status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let applied = self.applied_versions().await?;

        Ok(MIGRATOR
            .iter()
            .map(|m| MigrationStatus {
                version: m.version,
                description: m.description.to_string(),
                applied: applied.contains(&m.version),
            })
            .collect())
    }

    /// Embedded migrations the database has not applied yet
    pub async fn pending(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        Ok(self.check_status().await?.into_iter().filter(|s| !s.applied).collect())
    }

    async fn applied_versions(&self) -> Result<HashSet<i64>, MigrationError> {
        let tracked: Option<(bool,)> = sqlx::query_as("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_optional(&self.pool)
            .await?;

        // Fresh database: sqlx has not created its tracking table yet
        if !matches!(tracked, Some((true,))) {
            return Ok(HashSet::new());
        }

        let rows: Vec<(i64,)> = sqlx::query_as("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}
