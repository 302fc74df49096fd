//! Configuration handling for Schema Architect

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::catalog::TargetLanguage;

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete Schema Architect configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub naming: NamingConfig,
    pub migrations: MigrationsConfig,
    pub codegen: CodegenConfig,
    pub output: OutputConfig,
    pub logging: Option<LoggingConfig>,
}

/// Naming conventions configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NamingConfig {
    /// Pattern for index names, with `{table}` and `{columns}` placeholders
    pub index_pattern: String,
    pub max_identifier_length: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            index_pattern: "idx_{table}_{columns}".to_string(),
            max_identifier_length: 64,
        }
    }
}

/// Migration settings configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MigrationsConfig {
    pub directory: String,
    pub version_width: usize,
    pub history_table: String,
    pub allow_destructive: bool,
    pub snapshot_file: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: "migrations".to_string(),
            version_width: 4,
            history_table: "schema_migrations".to_string(),
            allow_destructive: false,
            snapshot_file: ".schema_snapshot.json".to_string(),
        }
    }
}

/// Access code generation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CodegenConfig {
    pub language: TargetLanguage,
    pub output_directory: String,
    pub page_size: u32,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            language: TargetLanguage::TypeScript,
            output_directory: "generated".to_string(),
            page_size: 50,
        }
    }
}

/// Output file configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub schema_file: String,
    pub diagram_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            schema_file: "schema.sql".to_string(),
            diagram_file: "schema.mmd".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [migrations]
            allow_destructive = true

            [codegen]
            language = "rust"
            "#,
        )
        .unwrap();

        assert!(config.migrations.allow_destructive);
        assert_eq!(config.migrations.version_width, 4);
        assert_eq!(config.migrations.history_table, "schema_migrations");
        assert_eq!(config.codegen.language, TargetLanguage::Rust);
        assert_eq!(config.codegen.page_size, 50);
        assert_eq!(config.naming.index_pattern, "idx_{table}_{columns}");
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nschema_file = \"db/schema.sql\"").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.output.schema_file, "db/schema.sql");
        assert_eq!(config.output.diagram_file, "schema.mmd");
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = load_from_file("/nonexistent/architect.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
