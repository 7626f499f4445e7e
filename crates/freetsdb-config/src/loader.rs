//! Configuration loader.
//!
//! This module provides the [`ConfigLoader`], which runs the start-up
//! pipeline: decode a document, apply environment overrides, validate.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{Config, ConfigError, EnvSource, StdEnv};

/// Structured text formats a configuration document may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (the native format).
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Look a format up by name (`"toml"` or `"json"`, any case).
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "toml" | "conf" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::unsupported_format(name)),
        }
    }

    /// Pick a format from a file extension.
    ///
    /// `.conf` files are TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        path.extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))
            .and_then(|ext| {
                Self::from_name(ext)
                    .map_err(|_| ConfigError::unsupported_format(path.display().to_string()))
            })
    }

    /// Decode `content` into a [`Config`].
    ///
    /// Top-level keys the document does not define are handled according
    /// to `unknown_keys`. Keys inside a section are never rejected.
    pub fn decode(self, content: &str, unknown_keys: UnknownKeys) -> Result<Config, ConfigError> {
        match self {
            Self::Toml => {
                let table: toml::Table = toml::from_str(content)?;
                check_unknown_keys(table.keys(), unknown_keys)?;
                Ok(toml::Value::Table(table).try_into()?)
            }
            Self::Json => {
                let value: serde_json::Value = serde_json::from_str(content)?;
                if let Some(object) = value.as_object() {
                    check_unknown_keys(object.keys(), unknown_keys)?;
                }
                Ok(serde_json::from_value(value)?)
            }
        }
    }
}

/// What to do with top-level keys the document does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Log and skip them.
    #[default]
    Ignore,
    /// Fail decoding with [`ConfigError::UnknownField`].
    Deny,
}

fn check_unknown_keys<'a>(
    keys: impl Iterator<Item = &'a String>,
    policy: UnknownKeys,
) -> Result<(), ConfigError> {
    for key in keys {
        if Config::KEYS.contains(&key.as_str()) {
            continue;
        }
        match policy {
            UnknownKeys::Ignore => warn!(key = %key, "ignoring unknown configuration section"),
            UnknownKeys::Deny => return Err(ConfigError::unknown_field(key, "<root>")),
        }
    }
    Ok(())
}

/// Configuration loader.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration document (TOML or JSON)
/// 3. Environment variables
///
/// and validates the result.
///
/// # Example
///
/// ```no_run
/// use freetsdb_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
///
/// # fn main() -> Result<(), freetsdb_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("/etc/freetsdb/freetsdb.conf")?
///     .with_env_prefix(DEFAULT_ENV_PREFIX)
///     .load()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigLoader {
    config: Config,
    env_prefix: Option<String>,
    env: Box<dyn EnvSource>,
    unknown_keys: UnknownKeys,
    source: Option<PathBuf>,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("config", &self.config)
            .field("env_prefix", &self.env_prefix)
            .field("unknown_keys", &self.unknown_keys)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use freetsdb_config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            env_prefix: None,
            env: Box::new(StdEnv),
            unknown_keys: UnknownKeys::default(),
            source: None,
        }
    }

    /// Start again from default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = Config::default();
        self
    }

    /// Place storage directories under `base` (see [`Config::with_base_dir`]).
    ///
    /// A document loaded afterwards replaces these values.
    #[must_use]
    pub fn with_base_dir(mut self, base: impl AsRef<Path>) -> Self {
        self.config = self.config.with_base_dir(base);
        self
    }

    /// Choose how unknown top-level keys are treated.
    ///
    /// Applies to documents loaded after this call.
    #[must_use]
    pub fn with_unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is taken from the extension: `.toml` and `.conf` are TOML,
    /// `.json` is JSON. The loaded document replaces anything loaded before.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file is not valid TOML/JSON or a value has the wrong type
    /// - The file has an unknown top-level key and unknown keys are denied
    ///
    /// # Example
    ///
    /// ```no_run
    /// use freetsdb_config::ConfigLoader;
    ///
    /// # fn main() -> Result<(), freetsdb_config::ConfigError> {
    /// let loader = ConfigLoader::new()
    ///     .with_file("freetsdb.conf")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = format.decode(&content, self.unknown_keys)?;
        self.source = Some(path.to_path_buf());

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration document
    /// * `format` - Format name ("toml" or "json")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unknown or decoding fails.
    ///
    /// # Example
    ///
    /// ```
    /// use freetsdb_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [http]
    ///     bind-address = ":8087"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load_unvalidated()
    ///     .unwrap();
    ///
    /// assert_eq!(config.http.bind_address, ":8087");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = ConfigFormat::from_name(format)?.decode(content, self.unknown_keys)?;
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// Without a prefix no overrides are applied.
    ///
    /// # Example
    ///
    /// ```
    /// use freetsdb_config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::new()
    ///     .with_env_prefix("FREETSDB");
    /// ```
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Read overrides from `env` instead of the process environment.
    #[must_use]
    pub fn with_env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Load a `.env` file into the process environment.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "loaded environment file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::EnvFile(e)),
        }
        Ok(self)
    }

    /// Apply overrides, validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - One or more environment overrides fail to parse
    /// - Configuration validation fails
    pub fn load(self) -> Result<Config, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        info!(services = ?config.enabled_services(), "configuration loaded");
        Ok(config)
    }

    /// Apply overrides and return the configuration without validating it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if one or more environment overrides fail to parse.
    pub fn load_unvalidated(mut self) -> Result<Config, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let report = self.config.apply_env_overrides(&prefix, self.env.as_ref())?;
            if !report.applied.is_empty() {
                info!(count = report.applied.len(), "applied environment overrides");
            }
        }
        if let Some(source) = &self.source {
            info!(path = %source.display(), "using configuration file");
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::MockEnv;

    const STORAGE: &str = r#"
        [meta]
        dir = "/tmp/meta"

        [data]
        dir = "/tmp/data"
        wal-dir = "/tmp/wal"
    "#;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load_unvalidated().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_loader_defaults_fail_validation_without_dirs() {
        assert!(ConfigLoader::new().load().is_err());
    }

    #[test]
    fn test_loader_with_base_dir() {
        let config = ConfigLoader::new()
            .with_base_dir("/var/lib/freetsdb")
            .load()
            .unwrap();
        assert_eq!(config.meta.dir, "/var/lib/freetsdb/meta");
    }

    #[test]
    fn test_loader_with_string_toml() {
        let config = ConfigLoader::new()
            .with_string(STORAGE, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.meta.dir, "/tmp/meta");
        assert_eq!(config.data.wal_dir, "/tmp/wal");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{
            "meta": {"dir": "/tmp/meta"},
            "data": {"dir": "/tmp/data", "wal-dir": "/tmp/wal"},
            "graphite": [{"protocol": "udp"}, {"protocol": "tcp"}]
        }"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.graphites.len(), 2);
        assert_eq!(config.graphites[0].protocol, "udp");
    }

    #[test]
    fn test_loader_with_unsupported_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_loader_malformed_toml() {
        let result = ConfigLoader::new().with_string("[meta\ndir = 1", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_loader_type_mismatch() {
        let result = ConfigLoader::new().with_string("[http]\nenabled = \"sometimes\"", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_unknown_top_level_key_ignored_by_default() {
        let toml = format!("{STORAGE}\n[hinted-handoff]\nenabled = true\n");
        let config = ConfigLoader::new()
            .with_string(&toml, "toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.meta.dir, "/tmp/meta");
    }

    #[test]
    fn test_unknown_top_level_key_denied() {
        let toml = format!("{STORAGE}\n[hinted-handoff]\nenabled = true\n");
        let err = ConfigLoader::new()
            .with_unknown_keys(UnknownKeys::Deny)
            .with_string(&toml, "toml")
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownField { ref field, .. } if field == "hinted-handoff"
        ));
    }

    #[test]
    fn test_unknown_key_inside_section_tolerated_when_denying() {
        let toml = "[http]\nbind-address = \":8087\"\nunix-socket = \"/tmp/x\"\n";
        let config = ConfigLoader::new()
            .with_unknown_keys(UnknownKeys::Deny)
            .with_string(toml, "toml")
            .unwrap()
            .load_unvalidated()
            .unwrap();
        assert_eq!(config.http.bind_address, ":8087");
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(STORAGE.as_bytes()).unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.data.dir, "/tmp/data");
    }

    #[test]
    fn test_loader_with_conf_extension_is_toml() {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        file.write_all(STORAGE.as_bytes()).unwrap();

        assert!(ConfigLoader::new().with_file(file.path()).is_ok());
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/freetsdb.conf");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/freetsdb.conf")
            .unwrap()
            .load_unvalidated()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_loader_applies_env_overrides() {
        let env = MockEnv::from_pairs([
            ("FREETSDB_HTTP_BIND_ADDRESS", ":9999"),
            ("FREETSDB_DATA_CACHE_MAX_MEMORY_SIZE", "1048576"),
        ]);

        let config = ConfigLoader::new()
            .with_string(STORAGE, "toml")
            .unwrap()
            .with_env_prefix("freetsdb")
            .with_env_source(env)
            .load()
            .unwrap();

        assert_eq!(config.http.bind_address, ":9999");
        assert_eq!(config.data.cache.max_memory_size, 1_048_576);
    }

    #[test]
    fn test_loader_without_prefix_ignores_env() {
        let env = MockEnv::from_pairs([("FREETSDB_HTTP_BIND_ADDRESS", ":9999")]);

        let config = ConfigLoader::new()
            .with_env_source(env)
            .load_unvalidated()
            .unwrap();

        assert_eq!(config.http.bind_address, ":8086");
    }

    #[test]
    fn test_loader_env_can_disable_storage() {
        let env = MockEnv::from_pairs([
            ("FREETSDB_META_ENABLED", "false"),
            ("FREETSDB_DATA_ENABLED", "false"),
        ]);

        let err = ConfigLoader::new()
            .with_string(STORAGE, "toml")
            .unwrap()
            .with_env_prefix("FREETSDB")
            .with_env_source(env)
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::NoStorageConfigured));
    }

    #[test]
    fn test_loader_bad_override_aborts() {
        let env = MockEnv::from_pairs([("FREETSDB_HTTP_AUTH_ENABLED", "sometimes")]);

        let err = ConfigLoader::new()
            .with_string(STORAGE, "toml")
            .unwrap()
            .with_env_prefix("FREETSDB")
            .with_env_source(env)
            .load()
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::EnvParseError { ref var, .. } if var == "FREETSDB_HTTP_AUTH_ENABLED"
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("a.yaml")).is_err());
        assert!(ConfigFormat::from_path(Path::new("freetsdb")).is_err());
    }
}
