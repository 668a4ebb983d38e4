//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into an [`OrchestratorConfig`], and
//! run validation before returning. The primary entry point for loading
//! configuration at startup; `LEXROUTE_CONFIG` names the file when the
//! caller does not.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)
//! - Semantic constraint rules (that belongs to `validation`)

use std::path::Path;

use super::validation::{self, ConfigError};
use super::OrchestratorConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LEXROUTE_CONFIG";

/// Load an [`OrchestratorConfig`] from a TOML file.
///
/// Reads the file, parses it as TOML, and validates all semantic
/// constraints.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read.
/// - [`ConfigError::Parse`] if the TOML is malformed.
/// - [`ConfigError::Validation`] if semantic constraints are violated.
pub fn load_from_file(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load an [`OrchestratorConfig`] from a TOML string.
///
/// Useful for testing or embedding configs without file I/O.
///
/// # Errors
///
/// - [`ConfigError::Parse`] if the TOML is malformed.
/// - [`ConfigError::Validation`] if semantic constraints are violated.
pub fn load_from_str(content: &str, source_name: &str) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}

/// Load configuration from the file named by `LEXROUTE_CONFIG`, or the
/// compiled defaults when the variable is unset.
///
/// # Errors
///
/// Propagates [`load_from_file`] errors when the variable names a file
/// that is unreadable, malformed, or invalid. An unset variable is not an
/// error.
pub fn load_default() -> Result<OrchestratorConfig, ConfigError> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => load_from_file(Path::new(&path)),
        Err(_) => Ok(OrchestratorConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TOML: &str = r#"
[routing]
fast_lookup_max_words = 5

[cache]
backend = "memory"
ttl_s = 600

[memory]
capacity = 4
"#;

    #[test]
    fn test_load_from_str_valid_toml_succeeds() {
        let config = load_from_str(VALID_TOML, "test").unwrap();
        assert_eq!(config.routing.fast_lookup_max_words, 5);
        assert_eq!(config.cache.ttl_s, 600);
    }

    #[test]
    fn test_load_from_str_invalid_toml_returns_parse_error() {
        let result = load_from_str("not valid toml [[[", "bad.toml");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_from_str_validation_failure_returns_validation_error() {
        let result = load_from_str(
            r#"
            [memory]
            capacity = 0
            "#,
            "zero-capacity.toml",
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file_valid_toml_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexroute.toml");
        std::fs::write(&path, VALID_TOML).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.memory.capacity, 4);
    }

    #[test]
    fn test_load_from_file_missing_file_returns_io_error() {
        let result = load_from_file(Path::new("/nonexistent/lexroute.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_from_str_source_name_appears_in_error() {
        let result = load_from_str("invalid [[[", "my-source.toml");
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("my-source.toml"));
    }

    #[test]
    fn test_empty_content_is_valid_default_config() {
        let config = load_from_str("", "empty.toml").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }
}
