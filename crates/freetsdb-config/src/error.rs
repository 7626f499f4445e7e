//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding, overriding or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The document format is neither TOML nor JSON.
    #[error("unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The format name or file path that was rejected.
        format: String,
    },

    /// Unknown field in configuration (strict mode).
    #[error("unknown configuration field: {field} in section {section}")]
    UnknownField {
        /// The unknown field name.
        field: String,
        /// The section containing the field.
        section: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// The `.env` file exists but could not be loaded.
    #[error("failed to load environment file: {0}")]
    EnvFile(#[source] dotenvy::Error),

    /// Neither the meta nor the data service is enabled.
    #[error("no storage service configured: meta, data, or both must be enabled")]
    NoStorageConfigured,

    /// Monitor storage is enabled on a node without the data service.
    #[error("monitor store requires data service: monitor.store-enabled cannot be set on meta-only nodes")]
    MonitorStoreRequiresData,

    /// Several independent problems, reported together.
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a new unknown field error.
    pub fn unknown_field(field: impl Into<String>, section: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
            section: section.into(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Fold collected errors into a single result.
    ///
    /// No errors is `Ok(())`, one error is returned as-is, and several are
    /// wrapped in [`ConfigError::Multiple`] in the order they were collected.
    pub fn collect(mut errors: Vec<ConfigError>) -> Result<(), ConfigError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Flatten this error into the individual problems it reports.
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            Self::Multiple(errors) => errors.iter().flat_map(ConfigError::errors).collect(),
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = ConfigError::file_not_found("/etc/freetsdb/freetsdb.conf");
        assert!(err.to_string().contains("/etc/freetsdb/freetsdb.conf"));
    }

    #[test]
    fn test_unknown_field_error() {
        let err = ConfigError::unknown_field("hinted-handoff", "<root>");
        assert!(err.to_string().contains("hinted-handoff"));
        assert!(err.to_string().contains("<root>"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("http.bind-address", "missing port");
        assert!(err.to_string().contains("http.bind-address"));
        assert!(err.to_string().contains("missing port"));
    }

    #[test]
    fn test_env_parse_error() {
        let err = ConfigError::env_parse_error("FREETSDB_HTTP_AUTH_ENABLED", "expected boolean");
        assert!(err.to_string().contains("FREETSDB_HTTP_AUTH_ENABLED"));
        assert!(err.to_string().contains("expected boolean"));
    }

    #[test]
    fn test_structural_errors_name_the_rule() {
        assert!(ConfigError::NoStorageConfigured
            .to_string()
            .contains("no storage service configured"));
        assert!(ConfigError::MonitorStoreRequiresData
            .to_string()
            .contains("requires data service"));
    }

    #[test]
    fn test_collect_empty_is_ok() {
        assert!(ConfigError::collect(Vec::new()).is_ok());
    }

    #[test]
    fn test_collect_single_is_unwrapped() {
        let err = ConfigError::collect(vec![ConfigError::NoStorageConfigured]).unwrap_err();
        assert!(matches!(err, ConfigError::NoStorageConfigured));
    }

    #[test]
    fn test_collect_many_reports_all() {
        let err = ConfigError::collect(vec![
            ConfigError::invalid_value("meta.dir", "must be specified"),
            ConfigError::MonitorStoreRequiresData,
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("2 configuration errors"));
        assert!(message.contains("meta.dir"));
        assert!(message.contains("monitor store"));
        assert_eq!(err.errors().len(), 2);
    }
}
