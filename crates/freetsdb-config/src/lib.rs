//! Typed server configuration for FreeTSDB.
//!
//! This crate describes the configuration document of a FreeTSDB server and
//! runs the start-up pipeline over it:
//!
//! 1. decode a TOML (or JSON) document into [`Config`];
//! 2. apply environment variable overrides;
//! 3. validate each section and the rules spanning sections.
//!
//! # Overview
//!
//! [`Config`] aggregates one value per section:
//!
//! - [`MetaConfig`], [`DataConfig`] - storage services
//! - [`ClusterConfig`] - cluster coordination
//! - [`AdminConfig`], [`HttpConfig`] - admin interface and HTTP API
//! - [`GraphiteConfig`] (repeated), [`CollectdConfig`], [`OpenTsdbConfig`],
//!   [`UdpConfig`] (repeated) - ingestion listeners
//! - [`MonitoringConfig`], [`MonitorConfig`], [`SubscriberConfig`],
//!   [`ContinuousQueryConfig`] - background services
//!
//! # Example
//!
//! ```no_run
//! use freetsdb_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! # fn main() -> Result<(), freetsdb_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("/etc/freetsdb/freetsdb.conf")?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! println!("HTTP API on {}", config.http.bind_address);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! join = "node-1:8088,node-2:8088"
//!
//! [meta]
//! dir = "/var/lib/freetsdb/meta"
//!
//! [data]
//! dir = "/var/lib/freetsdb/data"
//! wal-dir = "/var/lib/freetsdb/wal"
//!
//! [data.cache]
//! max-memory-size = 524288000
//!
//! [http]
//! bind-address = ":8086"
//!
//! [[graphite]]
//! enabled = true
//! protocol = "udp"
//!
//! [[graphite]]
//! enabled = true
//! bind-address = ":2004"
//!
//! [monitor]
//! store-enabled = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every registered field can be overridden with
//! `FREETSDB_<SECTION>_<FIELD>`; entries of repeated sections take their
//! 1-based position as `FREETSDB_<SECTION>_<INDEX>_<FIELD>`:
//!
//! - `FREETSDB_HTTP_BIND_ADDRESS=:9086`
//! - `FREETSDB_DATA_CACHE_MAX_MEMORY_SIZE=1073741824`
//! - `FREETSDB_GRAPHITE_2_PROTOCOL=udp`

#![warn(missing_docs)]

mod config;
mod env;
mod error;
pub mod listeners;
mod loader;
mod schema;
mod section;
pub mod validate;

pub use config::Config;
pub use env::{
    apply_env_overrides, EnvSource, FromEnv, MockEnv, OverrideReport, Overridable, Overrides,
    StdEnv, DEFAULT_ENV_PREFIX,
};
pub use error::ConfigError;
pub use listeners::{CollectdConfig, GraphiteConfig, OpenTsdbConfig, UdpConfig};
pub use loader::{ConfigFormat, ConfigLoader, UnknownKeys};
pub use schema::*;
pub use section::Section;
pub use validate::Violations;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.bind_address, ":8086");
        assert_eq!(config.admin.bind_address, ":8083");
        assert!(config.meta.is_enabled());
        assert!(config.data.is_enabled());
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let decoded = ConfigFormat::Toml
            .decode(&rendered, UnknownKeys::Deny)
            .unwrap();
        assert_eq!(decoded, Config::default());
    }
}
