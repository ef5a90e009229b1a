use atlas_core::AtlasError;
use console::style;
use std::fmt;

/// Error with context and remediation steps, rendered on stderr
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn database_connection_failed(error: &str, url: Option<&str>) -> CliError {
    let target = url.map(|u| format!("\nDatabase: {}", u)).unwrap_or_default();
    CliError::new("Cannot connect to PostgreSQL")
        .with_context(format!("The import needs a reachable PostGIS database.{}\n\nError: {}", target, error))
        .with_suggestion("Set DATABASE_URL: export DATABASE_URL=\"postgresql://localhost/atlas\"")
        .with_suggestion("Ensure PostgreSQL is running and the postgis extension is available")
        .with_suggestion("Or try the pipeline without a database: atlas import --storage memory")
        .with_help("Run: atlas import --help")
}

pub fn data_dir_not_found(path: &str) -> CliError {
    CliError::new("Data directory not found")
        .with_context(format!("The source data directory does not exist.\n\nPath: {}", path))
        .with_suggestion("Pass it explicitly: atlas import --data-dir <DIR>")
        .with_suggestion("Or set ATLAS_DATA_DIR, or data_dir in atlas.toml")
        .with_help("Run: atlas config")
}

pub fn source_not_found(path: &str) -> CliError {
    CliError::new("Source file not found")
        .with_context(format!("The specified source file does not exist.\n\nPath: {}", path))
        .with_suggestion("Check the file path and try again")
        .with_help("Run: atlas inspect --help")
}

pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check atlas.toml for syntax errors")
        .with_suggestion("Check ATLAS_* environment variables")
        .with_help("Run: atlas config")
}

/// Turn any error into a CliError, keeping one that already is
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<CliError>() {
        Ok(cli_error) => return cli_error,
        Err(other) => other,
    };

    if let Some(AtlasError::ConfigInvalid { key, reason }) = error.downcast_ref::<AtlasError>() {
        return invalid_config(key, reason);
    }

    let message = format!("{:#}", error);
    if message.contains("Connection refused") || message.contains("could not connect") {
        database_connection_failed(&message, None)
    } else if message.contains("Permission denied") || message.contains("permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check file permissions")
    } else {
        CliError::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_survives_anyhow() {
        let err = anyhow::Error::from(source_not_found("/tmp/x.shp"));
        let back = from_anyhow(err);
        assert_eq!(back.message, "Source file not found");
        assert_eq!(back.suggestions.len(), 1);
    }

    #[test]
    fn test_config_errors_get_suggestions() {
        let err = anyhow::Error::from(AtlasError::ConfigInvalid {
            key: "simplify_tolerance".into(),
            reason: "must be positive".into(),
        });
        let cli = from_anyhow(err);
        assert_eq!(cli.message, "Invalid configuration: simplify_tolerance");
        assert!(!cli.suggestions.is_empty());
    }
}
