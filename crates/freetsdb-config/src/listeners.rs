//! Ingestion listener sections: graphite, collectd, OpenTSDB and UDP.
//!
//! `[[graphite]]` and `[[udp]]` are arrays of tables; a node may run any
//! number of each. `[collectd]` and `[opentsdb]` are singletons.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::DEFAULT_CERTIFICATE;
use crate::validate::CONSISTENCY_LEVELS;
use crate::{Overridable, Overrides, Section, Violations};

/// Transport protocols a graphite listener accepts.
pub const GRAPHITE_PROTOCOLS: &[&str] = &["tcp", "udp"];

/// Timestamp precisions accepted by the UDP listener (empty means nanoseconds).
pub const UDP_PRECISIONS: &[&str] = &["", "n", "u", "ms", "s", "m", "h"];

/// Graphite listener, one `[[graphite]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphiteConfig {
    /// Run this listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Database receiving points.
    pub database: String,

    /// `tcp` or `udp`.
    pub protocol: String,

    /// Write consistency level.
    pub consistency_level: String,

    /// Separator placed between joined metric name parts.
    pub separator: String,

    /// Points buffered before a write.
    pub batch_size: usize,

    /// Batches that may be pending in memory.
    pub batch_pending: usize,

    /// Flush a partial batch after this long.
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,

    /// UDP socket receive buffer in bytes, 0 for the OS default.
    pub udp_read_buffer: usize,

    /// Metric name templates.
    pub templates: Vec<String>,

    /// Default `key=value` tags added to every point.
    pub tags: Vec<String>,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: ":2003".to_string(),
            database: "graphite".to_string(),
            protocol: "tcp".to_string(),
            consistency_level: "one".to_string(),
            separator: ".".to_string(),
            batch_size: 5000,
            batch_pending: 10,
            batch_timeout: Duration::from_secs(1),
            udp_read_buffer: 0,
            templates: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl Overridable for GraphiteConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("database", &mut self.database);
        env.field("protocol", &mut self.protocol);
        env.field("consistency-level", &mut self.consistency_level);
        env.field("separator", &mut self.separator);
        env.field("batch-size", &mut self.batch_size);
        env.field("batch-pending", &mut self.batch_pending);
        env.field("batch-timeout", &mut self.batch_timeout);
        env.field("udp-read-buffer", &mut self.udp_read_buffer);
        env.field("templates", &mut self.templates);
        env.field("tags", &mut self.tags);
    }
}

impl Section for GraphiteConfig {
    const NAME: &'static str = "graphite";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        violations.require("database", &self.database);
        violations.one_of("protocol", &self.protocol.to_lowercase(), GRAPHITE_PROTOCOLS);
        violations.one_of(
            "consistency-level",
            &self.consistency_level.to_lowercase(),
            CONSISTENCY_LEVELS,
        );
        if self.batch_size == 0 {
            violations.invalid("batch-size", "must be greater than zero");
        }
        for tag in &self.tags {
            match tag.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {}
                _ => violations.invalid("tags", format!("{tag:?} is not key=value")),
            }
        }
    }
}

/// collectd listener section, `[collectd]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollectdConfig {
    /// Run the listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Database receiving points.
    pub database: String,

    /// Retention policy receiving points, empty for the default.
    pub retention_policy: String,

    /// Points buffered before a write.
    pub batch_size: usize,

    /// Batches that may be pending in memory.
    pub batch_pending: usize,

    /// Flush a partial batch after this long.
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,

    /// Socket receive buffer in bytes, 0 for the OS default.
    pub read_buffer: usize,

    /// Path of the collectd types database.
    pub typesdb: String,
}

impl Default for CollectdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: ":25826".to_string(),
            database: "collectd".to_string(),
            retention_policy: String::new(),
            batch_size: 5000,
            batch_pending: 10,
            batch_timeout: Duration::from_secs(10),
            read_buffer: 0,
            typesdb: "/usr/share/collectd/types.db".to_string(),
        }
    }
}

impl Overridable for CollectdConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("database", &mut self.database);
        env.field("retention-policy", &mut self.retention_policy);
        env.field("batch-size", &mut self.batch_size);
        env.field("batch-pending", &mut self.batch_pending);
        env.field("batch-timeout", &mut self.batch_timeout);
        env.field("read-buffer", &mut self.read_buffer);
        env.field("typesdb", &mut self.typesdb);
    }
}

impl Section for CollectdConfig {
    const NAME: &'static str = "collectd";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        violations.require("database", &self.database);
        violations.require("typesdb", &self.typesdb);
    }
}

/// OpenTSDB listener section, `[opentsdb]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct OpenTsdbConfig {
    /// Run the listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Database receiving points.
    pub database: String,

    /// Retention policy receiving points, empty for the default.
    pub retention_policy: String,

    /// Write consistency level.
    pub consistency_level: String,

    /// Accept connections over TLS.
    pub tls_enabled: bool,

    /// Certificate used when `tls-enabled` is set.
    pub certificate: String,

    /// Points buffered before a write.
    pub batch_size: usize,

    /// Batches that may be pending in memory.
    pub batch_pending: usize,

    /// Flush a partial batch after this long.
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,

    /// Log points that fail to parse.
    pub log_point_errors: bool,
}

impl Default for OpenTsdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: ":4242".to_string(),
            database: "opentsdb".to_string(),
            retention_policy: String::new(),
            consistency_level: "one".to_string(),
            tls_enabled: false,
            certificate: DEFAULT_CERTIFICATE.to_string(),
            batch_size: 1000,
            batch_pending: 5,
            batch_timeout: Duration::from_secs(1),
            log_point_errors: true,
        }
    }
}

impl Overridable for OpenTsdbConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("database", &mut self.database);
        env.field("retention-policy", &mut self.retention_policy);
        env.field("consistency-level", &mut self.consistency_level);
        env.field("tls-enabled", &mut self.tls_enabled);
        env.field("certificate", &mut self.certificate);
        env.field("batch-size", &mut self.batch_size);
        env.field("batch-pending", &mut self.batch_pending);
        env.field("batch-timeout", &mut self.batch_timeout);
        env.field("log-point-errors", &mut self.log_point_errors);
    }
}

impl Section for OpenTsdbConfig {
    const NAME: &'static str = "opentsdb";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        violations.require("database", &self.database);
        violations.one_of(
            "consistency-level",
            &self.consistency_level.to_lowercase(),
            CONSISTENCY_LEVELS,
        );
        if self.tls_enabled {
            violations.require("certificate", &self.certificate);
        }
    }
}

/// UDP line-protocol listener, one `[[udp]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct UdpConfig {
    /// Run this listener.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Database receiving points.
    pub database: String,

    /// Retention policy receiving points, empty for the default.
    pub retention_policy: String,

    /// Points buffered before a write.
    pub batch_size: usize,

    /// Batches that may be pending in memory.
    pub batch_pending: usize,

    /// Socket receive buffer in bytes, 0 for the OS default.
    pub read_buffer: usize,

    /// Flush a partial batch after this long.
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,

    /// Precision of incoming timestamps.
    pub precision: String,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: ":8089".to_string(),
            database: "udp".to_string(),
            retention_policy: String::new(),
            batch_size: 5000,
            batch_pending: 10,
            read_buffer: 0,
            batch_timeout: Duration::from_secs(1),
            precision: String::new(),
        }
    }
}

impl Overridable for UdpConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("database", &mut self.database);
        env.field("retention-policy", &mut self.retention_policy);
        env.field("batch-size", &mut self.batch_size);
        env.field("batch-pending", &mut self.batch_pending);
        env.field("read-buffer", &mut self.read_buffer);
        env.field("batch-timeout", &mut self.batch_timeout);
        env.field("precision", &mut self.precision);
    }
}

impl Section for UdpConfig {
    const NAME: &'static str = "udp";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        violations.require("database", &self.database);
        violations.one_of("precision", &self.precision, UDP_PRECISIONS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<S: Section>(section: &S) -> Vec<String> {
        let mut violations = Violations::new();
        violations.check_section(S::NAME, section);
        match violations.into_result() {
            Ok(()) => Vec::new(),
            Err(err) => err.errors().iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_graphite_config_default() {
        let config = GraphiteConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.bind_address, ":2003");
        assert_eq!(config.protocol, "tcp");
        assert_eq!(config.batch_size, 5000);
    }

    #[test]
    fn test_graphite_config_deserialize() {
        let toml = r#"
            enabled = true
            protocol = "udp"
            templates = ["servers.* .host.measurement*"]
            tags = ["region=us-east"]
        "#;
        let config: GraphiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.protocol, "udp");
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.tags, vec!["region=us-east"]);
        assert!(check(&config).is_empty());
    }

    #[test]
    fn test_graphite_config_validate() {
        let config = GraphiteConfig {
            enabled: true,
            protocol: "sctp".to_string(),
            consistency_level: "most".to_string(),
            tags: vec!["region".to_string()],
            ..GraphiteConfig::default()
        };

        let problems = check(&config);
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("graphite.protocol"));
        assert!(problems[1].contains("graphite.consistency-level"));
        assert!(problems[2].contains("\"region\" is not key=value"));
    }

    #[test]
    fn test_graphite_protocol_case_insensitive() {
        let config = GraphiteConfig {
            enabled: true,
            protocol: "UDP".to_string(),
            ..GraphiteConfig::default()
        };
        assert!(check(&config).is_empty());
    }

    #[test]
    fn test_collectd_config_default() {
        let config = CollectdConfig::default();
        assert_eq!(config.bind_address, ":25826");
        assert_eq!(config.batch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_opentsdb_tls_requires_certificate() {
        let config = OpenTsdbConfig {
            enabled: true,
            tls_enabled: true,
            certificate: String::new(),
            ..OpenTsdbConfig::default()
        };

        let problems = check(&config);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("opentsdb.certificate"));
    }

    #[test]
    fn test_udp_config_validate() {
        let config = UdpConfig {
            enabled: true,
            bind_address: ":4444".to_string(),
            precision: "ps".to_string(),
            ..UdpConfig::default()
        };

        let problems = check(&config);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("udp.precision"));
    }
}
