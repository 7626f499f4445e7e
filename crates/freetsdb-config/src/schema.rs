//! Configuration schema types for the storage, cluster and API sections.
//!
//! Ingestion listeners live in [`listeners`](crate::listeners).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Overridable, Overrides, Section, Violations};

/// Storage engines the data service can run.
pub const STORAGE_ENGINES: &[&str] = &["tsm1"];

/// Default certificate path shared by the TLS-capable sections.
pub const DEFAULT_CERTIFICATE: &str = "/etc/ssl/freetsdb.pem";

/// Meta (cluster metadata) service section, `[meta]`.
///
/// `enabled` is kept as written: an omitted value means enabled, but the
/// validator can still tell an explicit `enabled = false` apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetaConfig {
    /// Run the meta service on this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Directory holding the meta store.
    pub dir: String,

    /// Raft bind address.
    pub bind_address: String,

    /// Meta HTTP API bind address.
    pub http_bind_address: String,

    /// Serve the meta HTTP API over TLS.
    pub https_enabled: bool,

    /// Certificate used when `https-enabled` is set.
    pub https_certificate: String,

    /// Create the default retention policy with each new database.
    pub retention_autocreate: bool,

    /// Raft election timeout.
    #[serde(with = "humantime_serde")]
    pub election_timeout: Duration,

    /// Raft heartbeat timeout.
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// Raft leader lease timeout.
    #[serde(with = "humantime_serde")]
    pub leader_lease_timeout: Duration,

    /// Raft commit timeout.
    #[serde(with = "humantime_serde")]
    pub commit_timeout: Duration,

    /// Log Raft internals.
    pub cluster_tracing: bool,

    /// Log meta service requests.
    pub logging_enabled: bool,

    /// How long node and shard-group leases are held.
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            dir: String::new(),
            bind_address: ":8088".to_string(),
            http_bind_address: ":8091".to_string(),
            https_enabled: false,
            https_certificate: String::new(),
            retention_autocreate: true,
            election_timeout: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(1),
            leader_lease_timeout: Duration::from_millis(500),
            commit_timeout: Duration::from_millis(50),
            cluster_tracing: false,
            logging_enabled: true,
            lease_duration: Duration::from_secs(60),
        }
    }
}

impl Overridable for MetaConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("dir", &mut self.dir);
        env.field("bind-address", &mut self.bind_address);
        env.field("http-bind-address", &mut self.http_bind_address);
        env.field("https-enabled", &mut self.https_enabled);
        env.field("https-certificate", &mut self.https_certificate);
        env.field("retention-autocreate", &mut self.retention_autocreate);
        env.field("election-timeout", &mut self.election_timeout);
        env.field("heartbeat-timeout", &mut self.heartbeat_timeout);
        env.field("leader-lease-timeout", &mut self.leader_lease_timeout);
        env.field("commit-timeout", &mut self.commit_timeout);
        env.field("cluster-tracing", &mut self.cluster_tracing);
        env.field("logging-enabled", &mut self.logging_enabled);
        env.field("lease-duration", &mut self.lease_duration);
    }
}

impl Section for MetaConfig {
    const NAME: &'static str = "meta";

    fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    fn has_explicit_enabled(&self) -> bool {
        self.enabled.is_some()
    }

    fn validate(&self, violations: &mut Violations) {
        violations.require("dir", &self.dir);
        violations.host_port("bind-address", &self.bind_address);
        violations.host_port("http-bind-address", &self.http_bind_address);
        if self.https_enabled {
            violations.require("https-certificate", &self.https_certificate);
        }
        violations.positive("election-timeout", self.election_timeout);
        violations.positive("heartbeat-timeout", self.heartbeat_timeout);
    }
}

/// In-memory cache tuning for the data service, `[data.cache]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Bytes a shard cache may hold before writes are rejected.
    pub max_memory_size: u64,

    /// Bytes after which the cache is snapshotted to disk.
    pub snapshot_memory_size: u64,

    /// Snapshot a shard that received no writes for this long.
    #[serde(with = "humantime_serde")]
    pub snapshot_write_cold_duration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_size: 500 * 1024 * 1024,
            snapshot_memory_size: 25 * 1024 * 1024,
            snapshot_write_cold_duration: Duration::from_secs(60 * 60),
        }
    }
}

impl Overridable for CacheConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("max-memory-size", &mut self.max_memory_size);
        env.field("snapshot-memory-size", &mut self.snapshot_memory_size);
        env.field(
            "snapshot-write-cold-duration",
            &mut self.snapshot_write_cold_duration,
        );
    }
}

/// Data (shard storage) service section, `[data]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DataConfig {
    /// Run the data service on this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Directory holding shard data.
    pub dir: String,

    /// Directory holding the write-ahead log.
    pub wal_dir: String,

    /// Storage engine for new shards.
    pub engine: String,

    /// Log every query.
    pub query_log_enabled: bool,

    /// Log write-ahead log activity.
    pub wal_logging_enabled: bool,

    /// Series a single database may hold, 0 for no limit.
    pub max_series_per_database: u64,

    /// Compact a shard fully after it received no writes for this long.
    #[serde(with = "humantime_serde")]
    pub compact_full_write_cold_duration: Duration,

    /// Cache tuning.
    pub cache: CacheConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            dir: String::new(),
            wal_dir: String::new(),
            engine: "tsm1".to_string(),
            query_log_enabled: true,
            wal_logging_enabled: true,
            max_series_per_database: 1_000_000,
            compact_full_write_cold_duration: Duration::from_secs(24 * 60 * 60),
            cache: CacheConfig::default(),
        }
    }
}

impl Overridable for DataConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("dir", &mut self.dir);
        env.field("wal-dir", &mut self.wal_dir);
        env.field("engine", &mut self.engine);
        env.field("query-log-enabled", &mut self.query_log_enabled);
        env.field("wal-logging-enabled", &mut self.wal_logging_enabled);
        env.field("max-series-per-database", &mut self.max_series_per_database);
        env.field(
            "compact-full-write-cold-duration",
            &mut self.compact_full_write_cold_duration,
        );
        env.nested("cache", &mut self.cache);
    }
}

impl Section for DataConfig {
    const NAME: &'static str = "data";

    fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    fn has_explicit_enabled(&self) -> bool {
        self.enabled.is_some()
    }

    fn validate(&self, violations: &mut Violations) {
        violations.require("dir", &self.dir);
        violations.require("wal-dir", &self.wal_dir);
        violations.one_of("engine", &self.engine, STORAGE_ENGINES);
    }
}

/// Cluster coordination section, `[cluster]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// Always map shards remotely, even when they are local.
    pub force_remote_mapping: bool,

    /// Timeout for a whole cluster write.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Timeout for a write to a single remote shard.
    #[serde(with = "humantime_serde")]
    pub shard_writer_timeout: Duration,

    /// Pooled connections per remote node.
    pub max_remote_write_connections: usize,

    /// Timeout for mapping a remote shard.
    #[serde(with = "humantime_serde")]
    pub shard_mapper_timeout: Duration,

    /// Queries allowed to run at once, 0 for no limit.
    pub max_concurrent_queries: usize,

    /// Kill queries running longer than this, 0 for no limit.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            force_remote_mapping: false,
            write_timeout: Duration::from_secs(5),
            shard_writer_timeout: Duration::from_secs(5),
            max_remote_write_connections: 3,
            shard_mapper_timeout: Duration::from_secs(5),
            max_concurrent_queries: 0,
            query_timeout: Duration::ZERO,
        }
    }
}

impl Overridable for ClusterConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("force-remote-mapping", &mut self.force_remote_mapping);
        env.field("write-timeout", &mut self.write_timeout);
        env.field("shard-writer-timeout", &mut self.shard_writer_timeout);
        env.field(
            "max-remote-write-connections",
            &mut self.max_remote_write_connections,
        );
        env.field("shard-mapper-timeout", &mut self.shard_mapper_timeout);
        env.field("max-concurrent-queries", &mut self.max_concurrent_queries);
        env.field("query-timeout", &mut self.query_timeout);
    }
}

impl Section for ClusterConfig {
    const NAME: &'static str = "cluster";

    fn validate(&self, violations: &mut Violations) {
        violations.positive("write-timeout", self.write_timeout);
        violations.positive("shard-writer-timeout", self.shard_writer_timeout);
        violations.positive("shard-mapper-timeout", self.shard_mapper_timeout);
        if self.max_remote_write_connections == 0 {
            violations.invalid("max-remote-write-connections", "must be greater than zero");
        }
    }
}

/// Admin web interface section, `[admin]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AdminConfig {
    /// Serve the admin interface.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Serve over TLS.
    pub https_enabled: bool,

    /// Certificate used when `https-enabled` is set.
    pub https_certificate: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: ":8083".to_string(),
            https_enabled: false,
            https_certificate: DEFAULT_CERTIFICATE.to_string(),
        }
    }
}

impl Overridable for AdminConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("https-enabled", &mut self.https_enabled);
        env.field("https-certificate", &mut self.https_certificate);
    }
}

impl Section for AdminConfig {
    const NAME: &'static str = "admin";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        if self.https_enabled {
            violations.require("https-certificate", &self.https_certificate);
        }
    }
}

/// HTTP API section, `[http]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Serve the HTTP API.
    pub enabled: bool,

    /// Bind address.
    pub bind_address: String,

    /// Require credentials on every request.
    pub auth_enabled: bool,

    /// Realm sent with authentication challenges.
    pub realm: String,

    /// Log every request.
    pub log_enabled: bool,

    /// Log the body of every write.
    pub write_tracing: bool,

    /// Expose profiling endpoints.
    pub pprof_enabled: bool,

    /// Serve over TLS.
    pub https_enabled: bool,

    /// Certificate used when `https-enabled` is set.
    pub https_certificate: String,

    /// Rows returned per chunk, 0 for no limit.
    pub max_row_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: ":8086".to_string(),
            auth_enabled: false,
            realm: "FreeTSDB".to_string(),
            log_enabled: true,
            write_tracing: false,
            pprof_enabled: false,
            https_enabled: false,
            https_certificate: DEFAULT_CERTIFICATE.to_string(),
            max_row_limit: 10_000,
        }
    }
}

impl Overridable for HttpConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("bind-address", &mut self.bind_address);
        env.field("auth-enabled", &mut self.auth_enabled);
        env.field("realm", &mut self.realm);
        env.field("log-enabled", &mut self.log_enabled);
        env.field("write-tracing", &mut self.write_tracing);
        env.field("pprof-enabled", &mut self.pprof_enabled);
        env.field("https-enabled", &mut self.https_enabled);
        env.field("https-certificate", &mut self.https_certificate);
        env.field("max-row-limit", &mut self.max_row_limit);
    }
}

impl Section for HttpConfig {
    const NAME: &'static str = "http";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.host_port("bind-address", &self.bind_address);
        if self.https_enabled {
            violations.require("https-certificate", &self.https_certificate);
        }
    }
}

/// Legacy self-monitoring section, `[monitoring]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct MonitoringConfig {
    /// Collect internal statistics.
    pub enabled: bool,

    /// How often statistics are collected.
    #[serde(with = "humantime_serde")]
    pub write_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            write_interval: Duration::from_secs(60),
        }
    }
}

impl Overridable for MonitoringConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("write-interval", &mut self.write_interval);
    }
}

impl Section for MonitoringConfig {
    const NAME: &'static str = "monitoring";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.positive("write-interval", self.write_interval);
    }
}

/// Monitor section, `[monitor]`: stores internal statistics in the data
/// service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// Write statistics into `store-database`.
    pub store_enabled: bool,

    /// Database receiving statistics.
    pub store_database: String,

    /// How often statistics are written.
    #[serde(with = "humantime_serde")]
    pub store_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            store_enabled: true,
            store_database: "_internal".to_string(),
            store_interval: Duration::from_secs(10),
        }
    }
}

impl Overridable for MonitorConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("store-enabled", &mut self.store_enabled);
        env.field("store-database", &mut self.store_database);
        env.field("store-interval", &mut self.store_interval);
    }
}

impl Section for MonitorConfig {
    const NAME: &'static str = "monitor";

    fn is_enabled(&self) -> bool {
        self.store_enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.require("store-database", &self.store_database);
        violations.positive("store-interval", self.store_interval);
    }
}

/// Subscriber section, `[subscriber]`: forwards writes to subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SubscriberConfig {
    /// Run the subscriber service.
    pub enabled: bool,

    /// Timeout for HTTP subscription writes.
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Overridable for SubscriberConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("http-timeout", &mut self.http_timeout);
    }
}

impl Section for SubscriberConfig {
    const NAME: &'static str = "subscriber";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.positive("http-timeout", self.http_timeout);
    }
}

/// Continuous query engine section, `[continuous_queries]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContinuousQueryConfig {
    /// Run continuous queries.
    pub enabled: bool,

    /// Log each continuous query run.
    pub log_enabled: bool,

    /// How often the engine checks for queries to run.
    #[serde(with = "humantime_serde")]
    pub run_interval: Duration,
}

impl Default for ContinuousQueryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_enabled: true,
            run_interval: Duration::from_secs(1),
        }
    }
}

impl Overridable for ContinuousQueryConfig {
    fn apply_overrides(&mut self, env: &mut Overrides<'_>) {
        env.field("enabled", &mut self.enabled);
        env.field("log-enabled", &mut self.log_enabled);
        env.field("run-interval", &mut self.run_interval);
    }
}

impl Section for ContinuousQueryConfig {
    const NAME: &'static str = "continuous_queries";

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, violations: &mut Violations) {
        violations.positive("run-interval", self.run_interval);
    }
}
