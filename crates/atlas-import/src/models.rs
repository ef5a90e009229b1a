use atlas_core::models::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;
use uuid::Uuid;

/// What happened to a single feature
#[derive(Debug)]
pub enum FeatureOutcome {
    Imported,
    /// Rejected by validation, CRS resolution or attribute mapping
    Skipped(atlas_core::AtlasError),
    /// Outside the area of interest
    Filtered,
    /// Store write failed after retries
    Failed(atlas_core::AtlasError),
}

/// Per-category tallies; imported + skipped + filtered + errors is the number of features read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub imported: u64,
    pub skipped: u64,
    pub filtered: u64,
    pub errors: u64,

    /// Sources the catalogue lists for the category
    pub sources: usize,
    /// Sources that were not on disk
    pub missing_sources: usize,
    /// Sources present but unreadable
    pub failed_sources: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, outcome: &FeatureOutcome) {
        match outcome {
            FeatureOutcome::Imported => self.imported += 1,
            FeatureOutcome::Skipped(_) => self.skipped += 1,
            FeatureOutcome::Filtered => self.filtered += 1,
            FeatureOutcome::Failed(_) => self.errors += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.imported + self.skipped + self.filtered + self.errors
    }

    /// No source of the category could be found
    pub fn source_missing(&self) -> bool {
        self.sources > 0 && self.missing_sources == self.sources
    }
}

impl AddAssign for CategoryCounts {
    fn add_assign(&mut self, other: Self) {
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.filtered += other.filtered;
        self.errors += other.errors;
        self.sources += other.sources;
        self.missing_sources += other.missing_sources;
        self.failed_sources += other.failed_sources;
    }
}

/// Final report of one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub store: String,

    /// Area of interest as [min_lng, min_lat, max_lng, max_lat], None when unbounded
    pub area_of_interest: Option<[f64; 4]>,

    pub categories: BTreeMap<Category, CategoryCounts>,
}

impl RunSummary {
    pub fn new(store: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            store: store.into(),
            area_of_interest: None,
            categories: BTreeMap::new(),
        }
    }

    pub fn counts(&self, category: Category) -> CategoryCounts {
        self.categories.get(&category).copied().unwrap_or_default()
    }

    pub fn totals(&self) -> CategoryCounts {
        let mut totals = CategoryCounts::default();
        for counts in self.categories.values() {
            totals += *counts;
        }
        totals
    }

    /// Categories that produced nothing because their sources were absent
    pub fn missing_categories(&self) -> Vec<Category> {
        self.categories.iter().filter(|(_, c)| c.source_missing()).map(|(c, _)| *c).collect()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
