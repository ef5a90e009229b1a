use crate::error::{AtlasError, Result};
use crate::models::ValidityMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "atlas.toml";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for an import run
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub data_dir: ConfigValue<PathBuf>,
    pub validity_mode: ConfigValue<ValidityMode>,
    pub simplify_tolerance: ConfigValue<f64>,
    pub store_retries: ConfigValue<u32>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            data_dir: ConfigValue::new(PathBuf::from("data"), ConfigSource::Default),
            validity_mode: ConfigValue::new(ValidityMode::Lenient, ConfigSource::Default),
            simplify_tolerance: ConfigValue::new(0.0001, ConfigSource::Default),
            store_retries: ConfigValue::new(3, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| AtlasError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| AtlasError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(data_dir) = file_config.data_dir {
            self.data_dir.update(data_dir, ConfigSource::File);
        }

        if let Some(validity_mode) = file_config.validity_mode {
            self.validity_mode.update(parse_validity_mode(&validity_mode)?, ConfigSource::File);
        }

        if let Some(tolerance) = file_config.simplify_tolerance {
            self.simplify_tolerance.update(validate_tolerance(tolerance)?, ConfigSource::File);
        }

        if let Some(retries) = file_config.store_retries {
            self.store_retries.update(retries, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load the file only when it exists
    pub fn load_from_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        if path.as_ref().exists() {
            self.load_from_file(path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.as_ref().display());
            Ok(self)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // ATLAS_DATA_DIR
        if let Ok(data_dir) = env::var("ATLAS_DATA_DIR") {
            if data_dir.trim().is_empty() {
                tracing::warn!("Ignoring empty ATLAS_DATA_DIR");
            } else {
                self.data_dir.update(PathBuf::from(data_dir), ConfigSource::Environment);
            }
        }

        // ATLAS_VALIDITY_MODE
        if let Ok(mode_str) = env::var("ATLAS_VALIDITY_MODE") {
            match parse_validity_mode(&mode_str) {
                Ok(mode) => self.validity_mode.update(mode, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid ATLAS_VALIDITY_MODE value '{}': expected strict or lenient",
                    mode_str
                ),
            }
        }

        // ATLAS_SIMPLIFY_TOLERANCE
        if let Ok(tolerance_str) = env::var("ATLAS_SIMPLIFY_TOLERANCE") {
            match tolerance_str.parse::<f64>().map_err(|e| e.to_string()).and_then(|t| {
                validate_tolerance(t).map_err(|e| e.to_string())
            }) {
                Ok(tolerance) => {
                    self.simplify_tolerance.update(tolerance, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid ATLAS_SIMPLIFY_TOLERANCE value '{}': expected a positive number of degrees",
                    tolerance_str
                ),
            }
        }

        // ATLAS_STORE_RETRIES
        if let Ok(retries_str) = env::var("ATLAS_STORE_RETRIES") {
            match retries_str.parse::<u32>() {
                Ok(retries) => self.store_retries.update(retries, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid ATLAS_STORE_RETRIES value '{}': expected a non-negative integer",
                    retries_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir.update(data_dir, ConfigSource::Cli);
        }

        if let Some(validity_mode) = overrides.validity_mode {
            self.validity_mode.update(validity_mode, ConfigSource::Cli);
        }

        if let Some(tolerance) = overrides.simplify_tolerance {
            self.simplify_tolerance.update(tolerance, ConfigSource::Cli);
        }

        if let Some(retries) = overrides.store_retries {
            self.store_retries.update(retries, ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut map = BTreeMap::new();

        map.insert(
            "data_dir".to_string(),
            (self.data_dir.value.display().to_string(), self.data_dir.source),
        );

        map.insert(
            "validity_mode".to_string(),
            (format!("{:?}", self.validity_mode.value), self.validity_mode.source),
        );

        map.insert(
            "simplify_tolerance".to_string(),
            (self.simplify_tolerance.value.to_string(), self.simplify_tolerance.source),
        );

        map.insert(
            "store_retries".to_string(),
            (self.store_retries.value.to_string(), self.store_retries.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    validity_mode: Option<String>,
    simplify_tolerance: Option<f64>,
    store_retries: Option<u32>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub validity_mode: Option<ValidityMode>,
    pub simplify_tolerance: Option<f64>,
    pub store_retries: Option<u32>,
}

/// Parse validity mode from string
pub fn parse_validity_mode(s: &str) -> Result<ValidityMode> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(ValidityMode::Strict),
        "lenient" => Ok(ValidityMode::Lenient),
        _ => Err(AtlasError::ConfigInvalid {
            key: "validity_mode".to_string(),
            reason: format!("Invalid validity mode: {}. Use strict or lenient", s),
        }),
    }
}

fn validate_tolerance(tolerance: f64) -> Result<f64> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(tolerance)
    } else {
        Err(AtlasError::ConfigInvalid {
            key: "simplify_tolerance".to_string(),
            reason: format!("must be a positive number of degrees, got {}", tolerance),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.data_dir.value, PathBuf::from("data"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert_eq!(config.validity_mode.value, ValidityMode::Lenient);
        assert_eq!(config.store_retries.value, 3);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/srv/atlas/shapefiles"
validity_mode = "strict"
simplify_tolerance = 0.0005
store_retries = 5
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.data_dir.value, PathBuf::from("/srv/atlas/shapefiles"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.validity_mode.value, ValidityMode::Strict);
        assert!((config.simplify_tolerance.value - 0.0005).abs() < f64::EPSILON);
        assert_eq!(config.store_retries.value, 5);
    }

    #[test]
    fn test_file_rejects_non_positive_tolerance() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "simplify_tolerance = 0.0").unwrap();

        assert!(LayeredConfig::with_defaults().load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_optional_file_keeps_defaults() {
        let config = LayeredConfig::with_defaults()
            .load_from_optional_file("/nonexistent/atlas.toml")
            .unwrap();
        assert_eq!(config.data_dir.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        let overrides = CliConfigOverrides {
            data_dir: Some(PathBuf::from("fixtures")),
            validity_mode: Some(ValidityMode::Strict),
            ..Default::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.data_dir.value, PathBuf::from("fixtures"));
        assert_eq!(config.data_dir.source, ConfigSource::Cli);
        assert_eq!(config.validity_mode.source, ConfigSource::Cli);
        assert_eq!(config.simplify_tolerance.source, ConfigSource::Default);
        assert_eq!(config.store_retries.source, ConfigSource::Default);
    }

    #[test]
    fn test_parse_validity_mode() {
        assert_eq!(parse_validity_mode("strict").unwrap(), ValidityMode::Strict);
        assert_eq!(parse_validity_mode("LENIENT").unwrap(), ValidityMode::Lenient);
        assert!(parse_validity_mode("invalid").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert_eq!(map.len(), 4);
        let (mode, source) = &map["validity_mode"];
        assert_eq!(mode, "Lenient");
        assert_eq!(*source, ConfigSource::Default);
    }
}
