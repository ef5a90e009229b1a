//! Staged import run
//!
//! A run walks [`ImportStage`] in order. Area bounds are loaded before any
//! filtering decision and the store is cleared before any write; each import
//! stage then processes its categories one after another, one feature at a
//! time. Per-feature problems only move counters. Setup failures and an
//! unreachable store abort the run.

use atlas_core::config::LayeredConfig;
use atlas_core::error::Result;
use atlas_core::formats::{CsvFormatReader, FormatReader, FormatRegistry};
use atlas_core::models::{Category, SourceFeature, StoreRecord, ValidityMode};
use atlas_core::AtlasError;
use atlas_geo::{parse_geometry, simplify_if_complex, AreaOfInterest, CoordinateNormalizer};
use atlas_store::{FeatureStore, RetryPolicy};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{Catalog, CategorySpec, SourceSpec};
use crate::models::{CategoryCounts, FeatureOutcome, RunSummary};
use crate::region::load_area_of_interest;

/// Steps of an import run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportStage {
    Idle,
    LoadingAreaBounds,
    ClearingStore,
    ImportingBoundaries,
    ImportingAdministrativeDistricts,
    ImportingPointSources,
    ImportingLineInfrastructure,
    ImportingPolygonAreas,
    ImportingTransportLines,
    Finalizing,
    Done,
}

impl ImportStage {
    /// Following stage, None once the run is done
    pub fn next(self) -> Option<ImportStage> {
        use ImportStage::*;
        match self {
            Idle => Some(LoadingAreaBounds),
            LoadingAreaBounds => Some(ClearingStore),
            ClearingStore => Some(ImportingBoundaries),
            ImportingBoundaries => Some(ImportingAdministrativeDistricts),
            ImportingAdministrativeDistricts => Some(ImportingPointSources),
            ImportingPointSources => Some(ImportingLineInfrastructure),
            ImportingLineInfrastructure => Some(ImportingPolygonAreas),
            ImportingPolygonAreas => Some(ImportingTransportLines),
            ImportingTransportLines => Some(Finalizing),
            Finalizing => Some(Done),
            Done => None,
        }
    }

    /// Whether the stage imports catalogue categories
    pub fn is_import(self) -> bool {
        use ImportStage::*;
        matches!(
            self,
            ImportingBoundaries
                | ImportingAdministrativeDistricts
                | ImportingPointSources
                | ImportingLineInfrastructure
                | ImportingPolygonAreas
                | ImportingTransportLines
        )
    }

    pub fn label(self) -> &'static str {
        use ImportStage::*;
        match self {
            Idle => "idle",
            LoadingAreaBounds => "loading area bounds",
            ClearingStore => "clearing store",
            ImportingBoundaries => "importing boundaries",
            ImportingAdministrativeDistricts => "importing administrative districts",
            ImportingPointSources => "importing point sources",
            ImportingLineInfrastructure => "importing line infrastructure",
            ImportingPolygonAreas => "importing polygon areas",
            ImportingTransportLines => "importing transport lines",
            Finalizing => "finalizing",
            Done => "done",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress hooks; every method defaults to doing nothing
pub trait ImportObserver {
    fn stage_started(&self, _stage: ImportStage) {}

    fn category_started(&self, _category: Category) {}

    fn feature_processed(&self, _category: Category, _counts: &CategoryCounts) {}

    fn category_finished(&self, _category: Category, _counts: &CategoryCounts) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl ImportObserver for NoopObserver {}

/// Knobs that come from configuration
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub data_dir: PathBuf,
    pub validity_mode: ValidityMode,
    pub simplify_tolerance: f64,
    pub retry: RetryPolicy,
}

impl ImportSettings {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            data_dir: config.data_dir.value.clone(),
            validity_mode: config.validity_mode.value,
            simplify_tolerance: config.simplify_tolerance.value,
            retry: RetryPolicy::new(config.store_retries.value, Duration::from_millis(200)),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::from_config(&LayeredConfig::with_defaults())
    }
}

/// Per-run switches
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Read, normalize and count without clearing or writing the store
    pub dry_run: bool,

    /// Restrict the run to these categories; None imports everything
    pub categories: Option<Vec<Category>>,
}

impl ImportOptions {
    pub fn includes(&self, category: Category) -> bool {
        self.categories.as_ref().map(|selected| selected.contains(&category)).unwrap_or(true)
    }
}

/// Drives one import run against a feature store
pub struct ImportPipeline<S: FeatureStore> {
    store: S,
    catalog: Catalog,
    settings: ImportSettings,
    options: ImportOptions,
    registry: FormatRegistry,
    normalizer: CoordinateNormalizer,
    observer: Box<dyn ImportObserver>,
}

impl<S: FeatureStore> ImportPipeline<S> {
    pub fn new(store: S, catalog: Catalog, settings: ImportSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
            options: ImportOptions::default(),
            registry: FormatRegistry::with_defaults(),
            normalizer: CoordinateNormalizer::austrian(),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_normalizer(mut self, normalizer: CoordinateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the readers used to detect source formats
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every stage and return the summary
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.store.backend_name(), self.options.dry_run);
        let mut region = AreaOfInterest::unbounded();

        tracing::info!(
            run_id = %summary.run_id,
            store = self.store.backend_name(),
            dry_run = self.options.dry_run,
            "Starting import from {}",
            self.settings.data_dir.display()
        );

        self.store.health_check().await?;

        let mut stage = ImportStage::Idle;
        while let Some(next) = stage.next() {
            stage = next;
            self.observer.stage_started(stage);
            tracing::debug!("Stage: {}", stage);

            match stage {
                ImportStage::LoadingAreaBounds => {
                    let paths: Vec<PathBuf> = self
                        .catalog
                        .boundary_sources()
                        .iter()
                        .map(|source| self.settings.data_dir.join(&source.path))
                        .collect();
                    let paths: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
                    region = load_area_of_interest(&self.registry, &self.normalizer, &paths).await;
                    summary.area_of_interest = region.envelope().map(|e| e.to_array());
                }
                ImportStage::ClearingStore => self.clear_store().await?,
                stage if stage.is_import() => {
                    for spec in self.catalog.for_stage(stage) {
                        if !self.options.includes(spec.category) {
                            continue;
                        }
                        let counts = self.import_category(spec, &region).await;
                        summary.categories.insert(spec.category, counts);
                    }
                }
                ImportStage::Finalizing => self.finalize(&mut summary).await,
                _ => {}
            }
        }

        Ok(summary)
    }

    async fn clear_store(&self) -> Result<()> {
        if self.options.dry_run {
            tracing::info!("Dry run, store left untouched");
            return Ok(());
        }

        let categories: Vec<Category> = self
            .catalog
            .categories()
            .iter()
            .map(|spec| spec.category)
            .filter(|c| self.options.includes(*c))
            .collect();

        let removed = self.store.clear(&categories).await?;
        tracing::info!("Cleared {} record(s) from {} categories", removed, categories.len());
        Ok(())
    }

    /// Import every source of one category; never fails, problems end up in the counts
    pub async fn import_category(&self, spec: &CategorySpec, region: &AreaOfInterest) -> CategoryCounts {
        let mut counts = CategoryCounts { sources: spec.sources.len(), ..Default::default() };
        self.observer.category_started(spec.category);

        for source in &spec.sources {
            let path = self.settings.data_dir.join(&source.path);
            if !path.exists() {
                tracing::warn!("{}: source not found, skipping: {}", spec.category, path.display());
                counts.missing_sources += 1;
                continue;
            }

            if let Err(e) = self.import_source(spec, source, &path, region, &mut counts).await {
                tracing::error!("{}: failed to read {}: {}", spec.category, path.display(), e);
                counts.failed_sources += 1;
            }
        }

        tracing::info!(
            "{}: {} imported, {} skipped, {} filtered, {} errors",
            spec.category,
            counts.imported,
            counts.skipped,
            counts.filtered,
            counts.errors
        );
        self.observer.category_finished(spec.category, &counts);
        counts
    }

    async fn import_source(
        &self,
        spec: &CategorySpec,
        source: &SourceSpec,
        path: &Path,
        region: &AreaOfInterest,
        counts: &mut CategoryCounts,
    ) -> Result<()> {
        let tabular;
        let reader: &dyn FormatReader = match &source.point_columns {
            Some((x, y)) => {
                tabular = CsvFormatReader::new().with_point_columns(x.clone(), y.clone());
                &tabular
            }
            None => self.registry.detect_format(path)?,
        };

        let hint = reader.declared_crs(path);
        let mut stream = reader.open(path).await?;

        while let Some(item) = stream.next().await {
            let outcome = match item {
                Ok(feature) => self.process_feature(spec, &feature, hint, region).await,
                Err(e) => FeatureOutcome::Skipped(e),
            };

            match &outcome {
                FeatureOutcome::Skipped(e) => tracing::debug!("{}: skipped: {}", spec.category, e),
                FeatureOutcome::Failed(e) => tracing::warn!("{}: store write failed: {}", spec.category, e),
                _ => {}
            }

            counts.record(&outcome);
            self.observer.feature_processed(spec.category, counts);
        }

        // Features seen before an abort stay counted; the source itself failed
        stream.finish()
    }

    /// Normalize, validate, filter, simplify, map and store one feature
    pub async fn process_feature(
        &self,
        spec: &CategorySpec,
        feature: &SourceFeature,
        hint: Option<u32>,
        region: &AreaOfInterest,
    ) -> FeatureOutcome {
        let normalized = feature.geometry.as_ref().map(|g| self.normalizer.normalize_with_hint(g, hint));

        if let Some(n) = normalized.as_ref().filter(|n| n.unresolved > 0) {
            match self.settings.validity_mode {
                ValidityMode::Strict => {
                    return FeatureOutcome::Skipped(AtlasError::UnresolvedCrs {
                        feature_id: feature.id.clone(),
                        unresolved: n.unresolved,
                    })
                }
                // Original values are kept; the range check below rejects them
                ValidityMode::Lenient => tracing::warn!(
                    "{}: feature {} has {} coordinate pair(s) no candidate system resolves",
                    spec.category,
                    feature.id,
                    n.unresolved
                ),
            }
        }

        let geometry = match parse_geometry(&feature.id, normalized.as_ref().map(|n| &n.geometry)) {
            Ok(geometry) => geometry,
            Err(e) => return FeatureOutcome::Skipped(e),
        };

        if !region.accepts(&geometry) {
            return FeatureOutcome::Filtered;
        }

        let geometry = match spec.simplify_threshold {
            Some(threshold) => simplify_if_complex(&geometry, threshold, self.settings.simplify_tolerance),
            None => geometry,
        };

        let mapped = match (spec.mapper)(feature) {
            Ok(mapped) => mapped,
            Err(e) => return FeatureOutcome::Skipped(e),
        };

        if self.options.dry_run {
            return FeatureOutcome::Imported;
        }

        let record = StoreRecord {
            category: spec.category,
            natural_key: mapped.natural_key,
            name: mapped.name,
            attributes: mapped.attributes,
            geometry,
            raw: feature.properties.clone(),
        };

        let what = format!("upsert {} feature {}", spec.category, feature.id);
        match self.settings.retry.run(&what, || self.store.upsert(&record)).await {
            Ok(_) => FeatureOutcome::Imported,
            Err(e) => FeatureOutcome::Failed(e),
        }
    }

    async fn finalize(&self, summary: &mut RunSummary) {
        if !self.options.dry_run {
            for category in summary.categories.keys() {
                match self.store.count(*category).await {
                    Ok(stored) => tracing::debug!("{}: {} record(s) stored", category, stored),
                    Err(e) => tracing::warn!("{}: could not count stored records: {}", category, e),
                }
            }
        }

        let missing = summary.missing_categories();
        if !missing.is_empty() {
            tracing::warn!(
                "No sources found for: {}",
                missing.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
            );
        }

        let totals = summary.totals();
        summary.finished_at = Some(Utc::now());
        tracing::info!(
            run_id = %summary.run_id,
            "Import finished: {} imported, {} skipped, {} filtered, {} errors",
            totals.imported,
            totals.skipped,
            totals.filtered,
            totals.errors
        );
    }
}
