//! Main configuration types.
//!
//! This module provides the top-level [`Config`] document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    AdminConfig, ClusterConfig, CollectdConfig, ConfigError, ContinuousQueryConfig, DataConfig,
    EnvSource, GraphiteConfig, HttpConfig, MetaConfig, MockEnv, MonitorConfig, MonitoringConfig,
    OpenTsdbConfig, OverrideReport, Overridable, Overrides, Section, SubscriberConfig, UdpConfig,
};

/// Complete FreeTSDB server configuration.
///
/// One value of each singleton section, an ordered list for each repeated
/// section, and the top-level scalars. Sections missing from a decoded
/// document keep their defaults.
///
/// The position of each `[[graphite]]` and `[[udp]]` entry is significant:
/// environment overrides address entries by their 1-based position, so the
/// order the document lists them in is the order they are overridden in.
///
/// # Example
///
/// ```
/// use freetsdb_config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.http.bind_address, ":8086");
/// assert_eq!(config.graphites.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Comma-separated `host:port` list of peers to join.
    pub join: String,

    /// Do not report anonymous usage data.
    pub reporting_disabled: bool,

    /// Meta service.
    pub meta: MetaConfig,

    /// Data service.
    pub data: DataConfig,

    /// Cluster coordination.
    pub cluster: ClusterConfig,

    /// Admin web interface.
    pub admin: AdminConfig,

    /// HTTP API.
    pub http: HttpConfig,

    /// Graphite listeners, in document order.
    #[serde(rename = "graphite")]
    pub graphites: Vec<GraphiteConfig>,

    /// collectd listener.
    pub collectd: CollectdConfig,

    /// OpenTSDB listener.
    pub opentsdb: OpenTsdbConfig,

    /// UDP listeners, in document order.
    #[serde(rename = "udp")]
    pub udps: Vec<UdpConfig>,

    /// Legacy self-monitoring.
    pub monitoring: MonitoringConfig,

    /// Subscriber service.
    pub subscriber: SubscriberConfig,

    /// Continuous query engine.
    #[serde(rename = "continuous_queries")]
    pub continuous_queries: ContinuousQueryConfig,

    /// Statistics storage.
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join: String::new(),
            reporting_disabled: false,
            meta: MetaConfig::default(),
            data: DataConfig::default(),
            cluster: ClusterConfig::default(),
            admin: AdminConfig::default(),
            http: HttpConfig::default(),
            graphites: vec![GraphiteConfig::default()],
            collectd: CollectdConfig::default(),
            opentsdb: OpenTsdbConfig::default(),
            udps: vec![UdpConfig::default()],
            monitoring: MonitoringConfig::default(),
            subscriber: SubscriberConfig::default(),
            continuous_queries: ContinuousQueryConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Every key the document may contain at the top level.
    pub const KEYS: &'static [&'static str] = &[
        "join",
        "reporting-disabled",
        MetaConfig::NAME,
        DataConfig::NAME,
        ClusterConfig::NAME,
        AdminConfig::NAME,
        HttpConfig::NAME,
        GraphiteConfig::NAME,
        CollectdConfig::NAME,
        OpenTsdbConfig::NAME,
        UdpConfig::NAME,
        MonitoringConfig::NAME,
        SubscriberConfig::NAME,
        ContinuousQueryConfig::NAME,
        MonitorConfig::NAME,
    ];

    /// Place the meta store, shard data and write-ahead log under `base`.
    ///
    /// # Example
    ///
    /// ```
    /// use freetsdb_config::Config;
    ///
    /// let config = Config::default().with_base_dir("/var/lib/freetsdb");
    /// assert_eq!(config.data.wal_dir, "/var/lib/freetsdb/wal");
    /// assert!(config.validate().is_ok());
    /// ```
    #[must_use]
    pub fn with_base_dir(mut self, base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        self.meta.dir = base.join("meta").display().to_string();
        self.data.dir = base.join("data").display().to_string();
        self.data.wal_dir = base.join("wal").display().to_string();
        self
    }

    /// The peers listed in `join`, trimmed, without empty entries.
    pub fn join_addresses(&self) -> Vec<&str> {
        self.join
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .collect()
    }

    /// Validate per-section rules and the rules spanning sections.
    ///
    /// # Errors
    ///
    /// Returns the single problem found, or [`ConfigError::Multiple`] with
    /// every problem: per-section ones first, then
    /// [`ConfigError::NoStorageConfigured`] or
    /// [`ConfigError::MonitorStoreRequiresData`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::validate::validate_config(self)
    }

    /// Apply environment overrides read from `env`, keyed under `prefix`.
    pub fn apply_env_overrides(
        &mut self,
        prefix: &str,
        env: &dyn EnvSource,
    ) -> Result<OverrideReport, ConfigError> {
        crate::env::apply_env_overrides(self, prefix, env)
    }

    /// Every override key this document answers to, in visiting order.
    ///
    /// # Example
    ///
    /// ```
    /// use freetsdb_config::Config;
    ///
    /// let keys = Config::default().env_keys("FREETSDB");
    /// assert!(keys.contains(&"FREETSDB_HTTP_BIND_ADDRESS".to_string()));
    /// assert!(keys.contains(&"FREETSDB_GRAPHITE_1_PROTOCOL".to_string()));
    /// ```
    pub fn env_keys(&self, prefix: &str) -> Vec<String> {
        let env = MockEnv::new();
        let mut overrides = Overrides::new(prefix, &env);
        self.clone().apply_overrides(&mut overrides);
        overrides.keys().to_vec()
    }

    /// Names of the services this configuration turns on.
    ///
    /// Repeated sections are listed once per enabled entry, as
    /// `name[position]`.
    pub fn enabled_services(&self) -> Vec<String> {
        let mut services = Vec::new();
        let mut singleton = |enabled: bool, name: &str| {
            if enabled {
                services.push(name.to_string());
            }
        };
        singleton(self.meta.is_enabled(), MetaConfig::NAME);
        singleton(self.data.is_enabled(), DataConfig::NAME);
        singleton(self.admin.is_enabled(), AdminConfig::NAME);
        singleton(self.http.is_enabled(), HttpConfig::NAME);
        singleton(self.collectd.is_enabled(), CollectdConfig::NAME);
        singleton(self.opentsdb.is_enabled(), OpenTsdbConfig::NAME);
        singleton(self.monitoring.is_enabled(), MonitoringConfig::NAME);
        singleton(self.subscriber.is_enabled(), SubscriberConfig::NAME);
        singleton(
            self.continuous_queries.is_enabled(),
            ContinuousQueryConfig::NAME,
        );
        singleton(self.monitor.is_enabled(), MonitorConfig::NAME);

        services.extend(repeated_services(&self.graphites));
        services.extend(repeated_services(&self.udps));
        services
    }
}

fn repeated_services<S: Section>(sections: &[S]) -> impl Iterator<Item = String> + '_ {
    sections
        .iter()
        .enumerate()
        .filter(|(_, section)| section.is_enabled())
        .map(|(index, _)| format!("{}[{}]", S::NAME, index + 1))
}

impl Overridable for Config {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("join", &mut self.join);
        env.field("reporting-disabled", &mut self.reporting_disabled);
        env.section(&mut self.meta);
        env.section(&mut self.data);
        env.section(&mut self.cluster);
        env.section(&mut self.admin);
        env.section(&mut self.http);
        env.repeated(&mut self.graphites);
        env.section(&mut self.collectd);
        env.section(&mut self.opentsdb);
        env.repeated(&mut self.udps);
        env.section(&mut self.monitoring);
        env.section(&mut self.subscriber);
        env.section(&mut self.continuous_queries);
        env.section(&mut self.monitor);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_has_one_listener_of_each_repeated_kind() {
        let config = Config::default();
        assert_eq!(config.graphites, vec![GraphiteConfig::default()]);
        assert_eq!(config.udps, vec![UdpConfig::default()]);
    }

    #[test]
    fn test_keys_match_serialized_document() {
        let value = toml::Value::try_from(Config::default()).unwrap();
        let table = value.as_table().unwrap();

        let serialized: HashSet<&str> = table.keys().map(String::as_str).collect();
        let declared: HashSet<&str> = Config::KEYS.iter().copied().collect();
        assert_eq!(serialized, declared);
    }

    #[test]
    fn test_join_addresses() {
        let config = Config {
            join: "foo:123, bar:456,,".to_string(),
            ..Config::default()
        };
        assert_eq!(config.join_addresses(), vec!["foo:123", "bar:456"]);
        assert!(Config::default().join_addresses().is_empty());
    }

    #[test]
    fn test_env_keys_are_unique() {
        let mut config = Config::default();
        config.graphites.push(GraphiteConfig::default());
        config.udps.push(UdpConfig::default());

        let keys = config.env_keys("FREETSDB");
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn test_env_keys_cover_nested_and_repeated_fields() {
        let keys = Config::default().env_keys("FREETSDB");

        for expected in [
            "FREETSDB_JOIN",
            "FREETSDB_META_DIR",
            "FREETSDB_DATA_CACHE_MAX_MEMORY_SIZE",
            "FREETSDB_CONTINUOUS_QUERIES_RUN_INTERVAL",
            "FREETSDB_GRAPHITE_1_PROTOCOL",
            "FREETSDB_UDP_1_BIND_ADDRESS",
            "FREETSDB_MONITOR_STORE_ENABLED",
        ] {
            assert!(keys.iter().any(|k| k == expected), "missing {expected}");
        }
        assert!(!keys.iter().any(|k| k == "FREETSDB_UDP_BIND_ADDRESS"));
    }

    #[test]
    fn test_enabled_services() {
        let mut config = Config::default();
        config.graphites.push(GraphiteConfig {
            enabled: true,
            ..GraphiteConfig::default()
        });
        config.data.enabled = Some(false);

        let services = config.enabled_services();
        assert!(services.contains(&"meta".to_string()));
        assert!(!services.contains(&"data".to_string()));
        assert!(services.contains(&"graphite[2]".to_string()));
        assert!(!services.contains(&"graphite[1]".to_string()));
        assert!(!services.contains(&"udp[1]".to_string()));
    }

    #[test]
    fn test_with_base_dir() {
        let config = Config::default().with_base_dir("/srv/tsdb");
        assert_eq!(config.meta.dir, "/srv/tsdb/meta");
        assert_eq!(config.data.dir, "/srv/tsdb/data");
        assert_eq!(config.data.wal_dir, "/srv/tsdb/wal");
    }
}
