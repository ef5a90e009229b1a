use atlas_core::models::Category;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Atlas - geodata importer for the CO2 storage atlas
#[derive(Parser, Debug)]
#[command(name = "atlas")]
#[command(about = "Normalize Austrian GIS sources into a PostGIS-backed spatial schema", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./atlas.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StorageBackend {
    /// In-memory storage, discarded on exit
    Memory,
    /// PostgreSQL/PostGIS, configured through DATABASE_URL
    Postgres,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full import pipeline
    Import(ImportArgs),

    /// Show what a single source file contains
    Inspect(InspectArgs),

    /// Show the effective configuration and where each value comes from
    Config,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Directory containing the source files
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend to write into
    #[arg(long, default_value = "memory")]
    pub storage: StorageBackend,

    /// Read and count everything without clearing or writing the store
    #[arg(long)]
    pub dry_run: bool,

    /// Only import these categories (repeatable)
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<Category>,

    /// Skip features whose coordinates no candidate CRS resolves
    #[arg(long)]
    pub strict: bool,

    /// Simplification tolerance in degrees
    #[arg(long, value_name = "DEGREES")]
    pub simplify_tolerance: Option<f64>,

    /// Extra attempts for transient store write failures
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Source file (Shapefile, GeoJSON or CSV)
    pub path: PathBuf,

    /// CSV column holding longitude or easting
    #[arg(long, requires = "y_column")]
    pub x_column: Option<String>,

    /// CSV column holding latitude or northing
    #[arg(long, requires = "x_column")]
    pub y_column: Option<String>,

    /// CSV field delimiter (sniffed from the header when omitted)
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,
}
