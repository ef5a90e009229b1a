//! Import command implementation

use crate::cli::ImportArgs;
use crate::config_loader::load_config_with_overrides;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::CategoryRow;
use crate::progress::ImportProgress;
use crate::storage::open_store;
use anyhow::Result;
use atlas_core::config::CliConfigOverrides;
use atlas_core::models::ValidityMode;
use atlas_import::{Catalog, ImportOptions, ImportPipeline, ImportSettings};
use std::path::Path;

pub async fn execute(args: ImportArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let overrides = CliConfigOverrides {
        data_dir: args.data_dir.clone(),
        validity_mode: args.strict.then_some(ValidityMode::Strict),
        simplify_tolerance: args.simplify_tolerance,
        store_retries: args.retries,
    };
    let config = load_config_with_overrides(config_path, overrides)?;
    let settings = ImportSettings::from_config(&config);

    if !settings.data_dir.is_dir() {
        return Err(errors::data_dir_not_found(&settings.data_dir.display().to_string()).into());
    }

    let store = open_store(args.storage).await?;
    let options = ImportOptions {
        dry_run: args.dry_run,
        categories: (!args.categories.is_empty()).then(|| args.categories.clone()),
    };

    if args.dry_run {
        output.info("Dry run: nothing will be cleared or written");
    }

    let pipeline = ImportPipeline::new(store, Catalog::austria(), settings)
        .with_options(options)
        .with_observer(Box::new(ImportProgress::new(output.is_json())));

    let summary = pipeline.run().await?;

    if output.is_json() {
        return output.result(&summary);
    }

    output.section("Import Summary");
    output.table(CategoryRow::from_summary(&summary));

    if let Some([min_lng, min_lat, max_lng, max_lat]) = summary.area_of_interest {
        output.kv("Area of interest", format!("{min_lng:.4}, {min_lat:.4} .. {max_lng:.4}, {max_lat:.4}"));
    } else {
        output.warning("No boundary data found, features were not filtered by region");
    }
    if let Some(duration) = summary.duration() {
        output.kv("Duration", format!("{:.1}s", duration.num_milliseconds() as f64 / 1000.0));
    }

    let missing = summary.missing_categories();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
        output.warning(format!("No source files found for: {}", names.join(", ")));
    }

    let totals = summary.totals();
    if totals.errors > 0 {
        output.warning(format!("{} feature(s) could not be written to the store", totals.errors));
    }

    let verb = if summary.dry_run { "Checked" } else { "Imported" };
    output.success(format!("{} {} feature(s) into {}", verb, totals.imported, summary.store));

    Ok(())
}
