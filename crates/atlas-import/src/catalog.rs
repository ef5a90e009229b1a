//! Which files feed which category, and how their features are mapped

use atlas_core::models::Category;
use std::fmt;
use std::path::PathBuf;

use crate::attributes::{self, AttributeMapper};
use crate::pipeline::ImportStage;

/// One source file, relative to the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub path: PathBuf,

    /// Longitude/easting and latitude/northing columns for tabular sources
    pub point_columns: Option<(String, String)>,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), point_columns: None }
    }

    /// Tabular source whose rows carry coordinates in two named columns
    pub fn tabular(path: impl Into<PathBuf>, x: &str, y: &str) -> Self {
        Self { path: path.into(), point_columns: Some((x.to_string(), y.to_string())) }
    }
}

/// Everything the orchestrator needs to import one category
#[derive(Clone)]
pub struct CategorySpec {
    pub category: Category,
    pub stage: ImportStage,
    pub sources: Vec<SourceSpec>,

    /// Vertex count above which geometries are simplified
    pub simplify_threshold: Option<usize>,

    pub mapper: AttributeMapper,
}

impl fmt::Debug for CategorySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategorySpec")
            .field("category", &self.category)
            .field("stage", &self.stage)
            .field("sources", &self.sources)
            .field("simplify_threshold", &self.simplify_threshold)
            .finish_non_exhaustive()
    }
}

impl CategorySpec {
    pub fn new(category: Category, stage: ImportStage, mapper: AttributeMapper) -> Self {
        Self { category, stage, sources: Vec::new(), simplify_threshold: None, mapper }
    }

    pub fn with_source(mut self, source: SourceSpec) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_simplify_threshold(mut self, threshold: usize) -> Self {
        self.simplify_threshold = Some(threshold);
        self
    }
}

/// The full set of categories an import run knows about
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<CategorySpec>,
}

impl Catalog {
    pub fn new(categories: Vec<CategorySpec>) -> Self {
        Self { categories }
    }

    /// Source layout of the Austrian atlas data directory
    pub fn austria() -> Self {
        use ImportStage::*;

        Self::new(vec![
            CategorySpec::new(Category::Boundaries, ImportingBoundaries, attributes::map_boundary)
                .with_source(SourceSpec::new("boundaries/austria_states.shp")),
            CategorySpec::new(
                Category::AdministrativeDistricts,
                ImportingAdministrativeDistricts,
                attributes::map_district,
            )
            .with_source(SourceSpec::new("administrative/updated_commune_cleaned.shp")),
            CategorySpec::new(Category::EmissionSources, ImportingPointSources, attributes::map_emission_source)
                .with_source(SourceSpec::tabular("emissions/co2_emitters.csv", "Longitude", "Latitude")),
            CategorySpec::new(Category::Landfills, ImportingPointSources, attributes::map_landfill)
                .with_source(SourceSpec::tabular("landfills/landfills.csv", "X", "Y")),
            CategorySpec::new(Category::GasPipelines, ImportingLineInfrastructure, attributes::map_pipeline)
                .with_source(SourceSpec::new("infrastructure/gas_pipelines.shp")),
            CategorySpec::new(Category::GroundwaterProtection, ImportingPolygonAreas, attributes::map_area)
                .with_source(SourceSpec::new("protection/groundwater_protection.shp"))
                .with_simplify_threshold(1000),
            CategorySpec::new(Category::ConservationAreas, ImportingPolygonAreas, attributes::map_area)
                .with_source(SourceSpec::new("protection/natura2000.shp"))
                .with_source(SourceSpec::new("protection/nature_reserves.shp"))
                .with_simplify_threshold(500),
            CategorySpec::new(Category::SettlementAreas, ImportingPolygonAreas, attributes::map_area)
                .with_source(SourceSpec::new("land_use/settlement_areas.shp"))
                .with_simplify_threshold(500),
            CategorySpec::new(Category::TransportLines, ImportingTransportLines, attributes::map_transport_line)
                .with_source(SourceSpec::new("transport/railways.shp"))
                .with_source(SourceSpec::new("transport/motorways.shp")),
        ])
    }

    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    pub fn get(&self, category: Category) -> Option<&CategorySpec> {
        self.categories.iter().find(|spec| spec.category == category)
    }

    /// Categories imported during `stage`, in catalogue order
    pub fn for_stage(&self, stage: ImportStage) -> impl Iterator<Item = &CategorySpec> {
        self.categories.iter().filter(move |spec| spec.stage == stage)
    }

    /// Sources whose extent defines the area of interest
    pub fn boundary_sources(&self) -> Vec<&SourceSpec> {
        self.get(Category::Boundaries).map(|spec| spec.sources.iter().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_austria_catalog_covers_every_category() {
        let catalog = Catalog::austria();
        for category in Category::ALL {
            assert!(catalog.get(category).is_some(), "{} missing from catalogue", category);
        }
    }

    #[test]
    fn test_polygon_thresholds() {
        let catalog = Catalog::austria();
        assert_eq!(catalog.get(Category::GroundwaterProtection).unwrap().simplify_threshold, Some(1000));
        assert_eq!(catalog.get(Category::ConservationAreas).unwrap().simplify_threshold, Some(500));
        assert_eq!(catalog.get(Category::SettlementAreas).unwrap().simplify_threshold, Some(500));
        assert_eq!(catalog.get(Category::TransportLines).unwrap().simplify_threshold, None);
    }

    #[test]
    fn test_for_stage_keeps_catalog_order() {
        let catalog = Catalog::austria();
        let points: Vec<Category> =
            catalog.for_stage(ImportStage::ImportingPointSources).map(|s| s.category).collect();
        assert_eq!(points, vec![Category::EmissionSources, Category::Landfills]);
    }

    #[test]
    fn test_tabular_sources_name_their_columns() {
        let catalog = Catalog::austria();
        let source = &catalog.get(Category::EmissionSources).unwrap().sources[0];
        assert_eq!(source.point_columns, Some(("Longitude".to_string(), "Latitude".to_string())));
        assert_eq!(catalog.boundary_sources().len(), 1);
    }
}
