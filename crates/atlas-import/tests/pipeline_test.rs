use async_trait::async_trait;
use atlas_core::error::{AtlasError, Result};
use atlas_core::formats::{spawn_reader, FeatureStream, FormatReader, FormatRegistry};
use atlas_core::models::{Category, Geometry, SourceFeature, StoreRecord, UpsertOutcome, ValidityMode};
use atlas_geo::CoordinateNormalizer;
use atlas_import::attributes;
use atlas_import::{
    Catalog, CategorySpec, ImportOptions, ImportPipeline, ImportSettings, ImportStage, SourceSpec,
};
use atlas_store::{FeatureStore, MemoryFeatureStore, RetryPolicy};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Boundary polygon spanning [13.0, 47.0, 14.5, 48.5]
fn write_boundaries(dir: &Path) {
    fs::create_dir_all(dir.join("boundaries")).unwrap();
    let collection = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "Oberösterreich"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[13.0, 47.0], [14.5, 47.0], [14.5, 48.5], [13.0, 48.5], [13.0, 47.0]]]
            }
        }]
    });
    fs::write(dir.join("boundaries/states.geojson"), collection.to_string()).unwrap();
}

fn point_feature(id: u32, geometry: Value) -> Value {
    json!({"type": "Feature", "id": id, "properties": {"Name": format!("Anlage {}", id)}, "geometry": geometry})
}

fn write_collection(dir: &Path, name: &str, features: Vec<Value>) {
    let collection = json!({"type": "FeatureCollection", "features": features});
    fs::write(dir.join(name), collection.to_string()).unwrap();
}

fn settings(dir: &Path) -> ImportSettings {
    ImportSettings {
        data_dir: dir.to_path_buf(),
        validity_mode: ValidityMode::Lenient,
        simplify_tolerance: 0.0001,
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
    }
}

fn boundaries_spec() -> CategorySpec {
    CategorySpec::new(Category::Boundaries, ImportStage::ImportingBoundaries, attributes::map_boundary)
        .with_source(SourceSpec::new("boundaries/states.geojson"))
}

fn emissions_spec(source: SourceSpec) -> CategorySpec {
    CategorySpec::new(Category::EmissionSources, ImportStage::ImportingPointSources, attributes::map_emission_source)
        .with_source(source)
}

#[tokio::test]
async fn counters_account_for_every_feature() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());

    let mut features: Vec<Value> = (0..5)
        .map(|i| point_feature(i, json!({"type": "Point", "coordinates": [13.1 + i as f64 * 0.2, 47.5]})))
        .collect();
    // Three structurally invalid
    features.push(point_feature(5, Value::Null));
    features.push(point_feature(6, json!({"type": "Point", "coordinates": [13.5, 47.5, 300.0]})));
    features.push(point_feature(7, json!({"type": "Point", "coordinates": [13.5, "47.5"]})));
    // Two outside the area
    features.push(point_feature(8, json!({"type": "Point", "coordinates": [16.3, 48.2]})));
    features.push(point_feature(9, json!({"type": "Point", "coordinates": [9.7, 47.2]})));
    write_collection(dir.path(), "emitters.geojson", features);

    let catalog = Catalog::new(vec![boundaries_spec(), emissions_spec(SourceSpec::new("emitters.geojson"))]);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()));
    let summary = pipeline.run().await.unwrap();

    let counts = summary.counts(Category::EmissionSources);
    assert_eq!(counts.imported, 5);
    assert_eq!(counts.skipped, 3);
    assert_eq!(counts.filtered, 2);
    assert_eq!(counts.errors, 0);
    assert_eq!(counts.processed(), 10);

    assert_eq!(summary.area_of_interest, Some([13.0, 47.0, 14.5, 48.5]));
    assert_eq!(pipeline.store().count(Category::EmissionSources).await.unwrap(), 5);
    assert_eq!(pipeline.store().count(Category::Boundaries).await.unwrap(), 1);
    assert!(summary.finished_at.is_some());
}

#[tokio::test]
async fn tabular_point_source_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    fs::write(
        dir.path().join("emitters.csv"),
        "Name;Longitude;Latitude;CO2_t\n\
         Zementwerk;13,2;47,5;180000\n\
         Unbekannt;n/a;47,5;1000\n\
         Heizkraftwerk;13,3;47,6;90000\n",
    )
    .unwrap();

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        emissions_spec(SourceSpec::tabular("emitters.csv", "Longitude", "Latitude")),
    ]);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()));
    let summary = pipeline.run().await.unwrap();

    let counts = summary.counts(Category::EmissionSources);
    assert_eq!((counts.imported, counts.skipped, counts.filtered), (2, 1, 0));

    let records = pipeline.store().records(Category::EmissionSources).unwrap();
    assert_eq!(records[0].geometry, Geometry::point(13.2, 47.5));
    assert_eq!(records[0].attributes["is_major"], json!(true));
    assert_eq!(records[1].attributes["is_major"], json!(false));
    // Source row kept verbatim
    assert_eq!(records[0].raw["Name"], json!("Zementwerk"));
}

#[tokio::test]
async fn in_range_coordinates_outside_the_area_are_filtered() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    fs::write(dir.path().join("emitters.csv"), "Name,lon,lat\nA,13.2,47.5\nB,20.0,47.5\nC,13.3,47.6\n").unwrap();

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        emissions_spec(SourceSpec::tabular("emitters.csv", "lon", "lat")),
    ]);
    let summary = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()))
        .run()
        .await
        .unwrap();

    let counts = summary.counts(Category::EmissionSources);
    assert_eq!((counts.imported, counts.skipped, counts.filtered), (2, 0, 1));
}

#[tokio::test]
async fn lambert_coordinates_are_reprojected() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    // False origin of Austria Lambert: 13°20'E 47°30'N
    fs::write(dir.path().join("landfills.csv"), "Name,X,Y\nDeponie,400000,400000\n").unwrap();

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        CategorySpec::new(Category::Landfills, ImportStage::ImportingPointSources, attributes::map_landfill)
            .with_source(SourceSpec::tabular("landfills.csv", "X", "Y")),
    ]);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()));
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.counts(Category::Landfills).imported, 1);
    let records = pipeline.store().records(Category::Landfills).unwrap();
    let Geometry::Point { coordinates: [lng, lat] } = records[0].geometry else {
        panic!("expected a point, got {:?}", records[0].geometry);
    };
    assert!((lng - 13.3333).abs() < 0.01, "lng = {}", lng);
    assert!((lat - 47.5).abs() < 0.01, "lat = {}", lat);
}

#[tokio::test]
async fn unresolved_coordinates_are_never_stored() {
    let dir = TempDir::new().unwrap();
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![point_feature(1, json!({"type": "Point", "coordinates": [400000.0, 400000.0]}))],
    );
    let catalog = Catalog::new(vec![emissions_spec(SourceSpec::new("emitters.geojson"))]);

    // No candidate systems, so the projected pair cannot be resolved.
    // No boundaries either: the area is unbounded, so only the range check stops it.
    let lenient = ImportPipeline::new(MemoryFeatureStore::new(), catalog.clone(), settings(dir.path()))
        .with_normalizer(CoordinateNormalizer::new(&[]));
    let summary = lenient.run().await.unwrap();
    assert_eq!(summary.area_of_interest, None);
    let counts = summary.counts(Category::EmissionSources);
    assert_eq!((counts.imported, counts.skipped, counts.filtered), (0, 1, 0));
    assert!(lenient.store().records(Category::EmissionSources).unwrap().is_empty());

    let strict_settings = ImportSettings { validity_mode: ValidityMode::Strict, ..settings(dir.path()) };
    let strict = ImportPipeline::new(MemoryFeatureStore::new(), catalog, strict_settings)
        .with_normalizer(CoordinateNormalizer::new(&[]));
    let summary = strict.run().await.unwrap();
    assert_eq!(summary.counts(Category::EmissionSources).skipped, 1);
    assert_eq!(summary.counts(Category::EmissionSources).imported, 0);
}

#[tokio::test]
async fn unresolvable_row_is_skipped_not_filtered() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    fs::write(dir.path().join("emitters.csv"), "Name,lon,lat\nA,13.2,47.5\nB,1e12,1e12\nC,13.3,47.6\n").unwrap();

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        emissions_spec(SourceSpec::tabular("emitters.csv", "lon", "lat")),
    ]);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()))
        .with_normalizer(CoordinateNormalizer::new(&[]));
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.area_of_interest, Some([13.0, 47.0, 14.5, 48.5]));
    let counts = summary.counts(Category::EmissionSources);
    assert_eq!((counts.imported, counts.skipped, counts.filtered), (2, 1, 0));
}

fn district(gkz: &str, name: &str, lng: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": {"GKZ": gkz, "PG": name, "OEVP_perc": 30.0, "FPOE_perc": 25.0, "SPO_perc": 20.0},
        "geometry": {"type": "Polygon", "coordinates": [[[lng, 47.5], [lng + 0.1, 47.5], [lng + 0.1, 47.6], [lng, 47.5]]]}
    })
}

fn districts_spec() -> CategorySpec {
    CategorySpec::new(
        Category::AdministrativeDistricts,
        ImportStage::ImportingAdministrativeDistricts,
        attributes::map_district,
    )
    .with_source(SourceSpec::new("districts.geojson"))
}

#[tokio::test]
async fn rerunning_an_import_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    write_collection(
        dir.path(),
        "districts.geojson",
        vec![district("40101", "Linz", 14.2), district("40201", "Steyr", 14.3)],
    );
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![point_feature(1, json!({"type": "Point", "coordinates": [13.7, 48.0]}))],
    );

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        districts_spec(),
        emissions_spec(SourceSpec::new("emitters.geojson")),
    ]);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()));

    let first = pipeline.run().await.unwrap();
    let stored_first = pipeline.store().records(Category::AdministrativeDistricts).unwrap();
    let emitters_first = pipeline.store().records(Category::EmissionSources).unwrap();

    let second = pipeline.run().await.unwrap();
    let stored_second = pipeline.store().records(Category::AdministrativeDistricts).unwrap();
    let emitters_second = pipeline.store().records(Category::EmissionSources).unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.categories, second.categories);
    assert_eq!(stored_first, stored_second);
    assert_eq!(emitters_first, emitters_second);
    assert_eq!(stored_second.len(), 2);
    assert_eq!(stored_second[0].attributes["affinity_percent"], json!(75.0));
}

#[tokio::test]
async fn duplicate_district_codes_upsert() {
    let dir = TempDir::new().unwrap();
    write_collection(
        dir.path(),
        "districts.geojson",
        vec![district("40101", "Linz", 14.2), district("40101", "Linz Stadt", 14.2)],
    );

    let pipeline = ImportPipeline::new(
        MemoryFeatureStore::new(),
        Catalog::new(vec![districts_spec()]),
        settings(dir.path()),
    );
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.counts(Category::AdministrativeDistricts).imported, 2);
    let stored = pipeline.store().get(Category::AdministrativeDistricts, "40101").unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Linz Stadt"));
    assert_eq!(pipeline.store().count(Category::AdministrativeDistricts).await.unwrap(), 1);
}

#[tokio::test]
async fn missing_sources_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![point_feature(1, json!({"type": "Point", "coordinates": [13.7, 48.0]}))],
    );

    let catalog = Catalog::new(vec![
        boundaries_spec(),
        CategorySpec::new(Category::GasPipelines, ImportStage::ImportingLineInfrastructure, attributes::map_pipeline)
            .with_source(SourceSpec::new("infrastructure/gas_pipelines.shp")),
        emissions_spec(SourceSpec::new("emitters.geojson")),
    ]);
    let summary = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()))
        .run()
        .await
        .unwrap();

    let pipelines = summary.counts(Category::GasPipelines);
    assert!(pipelines.source_missing());
    assert_eq!(pipelines.processed(), 0);
    assert_eq!(summary.missing_categories(), vec![Category::GasPipelines]);
    assert_eq!(summary.counts(Category::EmissionSources).imported, 1);
}

#[tokio::test]
async fn dry_run_counts_without_writing() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![point_feature(1, json!({"type": "Point", "coordinates": [13.7, 48.0]}))],
    );

    let store = MemoryFeatureStore::new();
    let existing = StoreRecord {
        category: Category::EmissionSources,
        natural_key: None,
        name: Some("from an earlier run".to_string()),
        attributes: Default::default(),
        geometry: Geometry::point(13.0, 47.0),
        raw: Default::default(),
    };
    store.upsert(&existing).await.unwrap();

    let catalog = Catalog::new(vec![boundaries_spec(), emissions_spec(SourceSpec::new("emitters.geojson"))]);
    let pipeline = ImportPipeline::new(store, catalog, settings(dir.path()))
        .with_options(ImportOptions { dry_run: true, categories: None });
    let summary = pipeline.run().await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.counts(Category::EmissionSources).imported, 1);
    assert_eq!(pipeline.store().records(Category::EmissionSources).unwrap(), vec![existing]);
    assert_eq!(pipeline.store().count(Category::Boundaries).await.unwrap(), 0);
}

#[tokio::test]
async fn category_subset_leaves_other_categories_alone() {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![point_feature(1, json!({"type": "Point", "coordinates": [13.7, 48.0]}))],
    );

    let catalog = Catalog::new(vec![boundaries_spec(), emissions_spec(SourceSpec::new("emitters.geojson"))]);
    let options = ImportOptions { dry_run: false, categories: Some(vec![Category::EmissionSources]) };
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path())).with_options(options);
    let summary = pipeline.run().await.unwrap();

    // Boundaries still define the area but are not imported
    assert_eq!(summary.area_of_interest, Some([13.0, 47.0, 14.5, 48.5]));
    assert!(!summary.categories.contains_key(&Category::Boundaries));
    assert_eq!(pipeline.store().count(Category::Boundaries).await.unwrap(), 0);
    assert_eq!(pipeline.store().count(Category::EmissionSources).await.unwrap(), 1);
}

/// Store that rejects every write, or is unreachable altogether
struct BrokenStore {
    reachable: bool,
}

#[async_trait]
impl FeatureStore for BrokenStore {
    async fn clear(&self, _categories: &[Category]) -> Result<u64> {
        Ok(0)
    }

    async fn upsert(&self, _record: &StoreRecord) -> Result<UpsertOutcome> {
        Err(AtlasError::StoreTransient("connection reset by peer".into()))
    }

    async fn count(&self, _category: Category) -> Result<u64> {
        Ok(0)
    }

    async fn health_check(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(AtlasError::StoreUnavailable("connection refused".into()))
        }
    }

    fn backend_name(&self) -> &str {
        "broken"
    }
}

#[tokio::test]
async fn failed_writes_count_as_errors() {
    let dir = TempDir::new().unwrap();
    write_collection(
        dir.path(),
        "emitters.geojson",
        vec![
            point_feature(1, json!({"type": "Point", "coordinates": [13.7, 48.0]})),
            point_feature(2, json!({"type": "Point", "coordinates": [13.8, 48.1]})),
        ],
    );

    let catalog = Catalog::new(vec![emissions_spec(SourceSpec::new("emitters.geojson"))]);
    let summary = ImportPipeline::new(BrokenStore { reachable: true }, catalog, settings(dir.path()))
        .run()
        .await
        .unwrap();

    let counts = summary.counts(Category::EmissionSources);
    assert_eq!(counts.errors, 2);
    assert_eq!(counts.imported, 0);
}

#[tokio::test]
async fn unreachable_store_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let catalog = Catalog::new(vec![emissions_spec(SourceSpec::new("emitters.geojson"))]);

    let result = ImportPipeline::new(BrokenStore { reachable: false }, catalog, settings(dir.path()))
        .run()
        .await;

    assert!(matches!(result, Err(AtlasError::StoreUnavailable(_))));
}

/// Closed ring of `points` distinct vertices around (13.5, 47.5)
fn circle(points: usize) -> Vec<[f64; 2]> {
    let mut ring: Vec<[f64; 2]> = (0..points)
        .map(|i| {
            let angle = i as f64 / points as f64 * std::f64::consts::TAU;
            [13.5 + 0.1 * angle.cos(), 47.5 + 0.1 * angle.sin()]
        })
        .collect();
    ring.push(ring[0]);
    ring
}

async fn import_conservation_area(ring: Vec<[f64; 2]>) -> Geometry {
    let dir = TempDir::new().unwrap();
    write_boundaries(dir.path());
    write_collection(
        dir.path(),
        "natura2000.geojson",
        vec![json!({
            "type": "Feature",
            "properties": {"SITENAME": "Kalkalpen"},
            "geometry": {"type": "Polygon", "coordinates": [ring]}
        })],
    );

    let areas = CategorySpec::new(Category::ConservationAreas, ImportStage::ImportingPolygonAreas, attributes::map_area)
        .with_source(SourceSpec::new("natura2000.geojson"))
        .with_simplify_threshold(500);
    let pipeline = ImportPipeline::new(MemoryFeatureStore::new(), Catalog::new(vec![boundaries_spec(), areas]), settings(dir.path()));
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.counts(Category::ConservationAreas).imported, 1);

    let mut records = pipeline.store().records(Category::ConservationAreas).unwrap();
    records.remove(0).geometry
}

#[tokio::test]
async fn polygons_above_the_threshold_are_simplified() {
    let ring = circle(600);
    assert_eq!(ring.len(), 601);

    let stored = import_conservation_area(ring).await;

    assert!(matches!(stored, Geometry::Polygon { .. }));
    assert!(stored.vertex_count() < 601);
    assert!(stored.vertex_count() >= 4);
}

#[tokio::test]
async fn polygons_at_the_threshold_are_stored_unchanged() {
    let ring = circle(499);
    assert_eq!(ring.len(), 500);

    let stored = import_conservation_area(ring.clone()).await;

    assert_eq!(stored, Geometry::polygon(vec![ring]));
}

/// Yields one feature, then fails the way a truncated file does
struct TruncatedReader;

#[async_trait]
impl FormatReader for TruncatedReader {
    async fn open(&self, _path: &Path) -> Result<FeatureStream> {
        Ok(spawn_reader(|sink| {
            sink.emit(Ok(SourceFeature {
                id: "0".to_string(),
                geometry: Some(json!({"type": "Point", "coordinates": [13.7, 48.0]})),
                properties: Default::default(),
            }));
            Err(AtlasError::FormatError { format: "Dump".to_string(), message: "unexpected end of file".to_string() })
        }))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["dump"]
    }

    fn format_name(&self) -> &str {
        "Dump"
    }
}

#[tokio::test]
async fn aborted_read_counts_as_failed_source() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("emitters.dump"), "").unwrap();

    let mut registry = FormatRegistry::new();
    registry.register(Box::new(TruncatedReader));
    let catalog = Catalog::new(vec![emissions_spec(SourceSpec::new("emitters.dump"))]);
    let summary = ImportPipeline::new(MemoryFeatureStore::new(), catalog, settings(dir.path()))
        .with_registry(registry)
        .run()
        .await
        .unwrap();

    let counts = summary.counts(Category::EmissionSources);
    assert_eq!(counts.imported, 1);
    assert_eq!(counts.skipped, 0);
    assert_eq!(counts.failed_sources, 1);
}
