use atlas_import::{CategoryCounts, RunSummary};
use serde::Serialize;
use tabled::Tabled;

/// One line of the import summary table
#[derive(Debug, Tabled)]
pub struct CategoryRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Imported")]
    pub imported: u64,
    #[tabled(rename = "Skipped")]
    pub skipped: u64,
    #[tabled(rename = "Filtered")]
    pub filtered: u64,
    #[tabled(rename = "Errors")]
    pub errors: u64,
    #[tabled(rename = "Sources")]
    pub sources: String,
}

impl CategoryRow {
    pub fn new(category: impl Into<String>, counts: &CategoryCounts) -> Self {
        let found = counts.sources - counts.missing_sources - counts.failed_sources;
        let mut sources = format!("{}/{}", found, counts.sources);
        if counts.source_missing() {
            sources.push_str(" (missing)");
        } else if counts.failed_sources > 0 {
            sources.push_str(&format!(" ({} unreadable)", counts.failed_sources));
        }

        Self {
            category: category.into(),
            imported: counts.imported,
            skipped: counts.skipped,
            filtered: counts.filtered,
            errors: counts.errors,
            sources,
        }
    }

    /// Rows for every category followed by a totals row
    pub fn from_summary(summary: &RunSummary) -> Vec<Self> {
        let mut rows: Vec<Self> =
            summary.categories.iter().map(|(category, counts)| Self::new(category.as_str(), counts)).collect();
        rows.push(Self::new("total", &summary.totals()));
        rows
    }
}

/// Output for inspect command
#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub path: String,
    pub format: String,
    pub feature_count: usize,
    pub features_without_geometry: usize,
    pub invalid_geometries: usize,
    pub declared_crs: Option<u32>,
    pub detected_crs: Option<u32>,
    pub envelope: Option<[f64; 4]>,
    pub geometry_types: Vec<String>,
    pub warnings: Vec<String>,
}

/// One configuration entry
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}
