//! Config command implementation

use crate::config_loader::load_config;
use crate::output::OutputWriter;
use crate::output_types::ConfigEntry;
use anyhow::Result;
use atlas_store::PostgresConfig;
use std::path::Path;

pub fn execute(config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(config_path)?;

    let mut entries: Vec<ConfigEntry> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigEntry { key, value, source: format!("{:?}", source) })
        .collect();

    // Only the redacted form of the URL is ever shown
    let database = match PostgresConfig::from_env() {
        Ok(pg) => ConfigEntry {
            key: "database_url".to_string(),
            value: pg.redacted_url(),
            source: "Environment".to_string(),
        },
        Err(_) => ConfigEntry {
            key: "database_url".to_string(),
            value: "(not set)".to_string(),
            source: "-".to_string(),
        },
    };
    entries.push(database);

    if output.is_json() {
        return output.result(&entries);
    }

    output.section("Configuration");
    output.table(entries);
    Ok(())
}
