//! Configuration validation.
//!
//! Validation runs in two stages over a fully decoded and overridden
//! [`Config`]:
//!
//! 1. every enabled section checks its own fields;
//! 2. rules that span sections are checked against the whole document.
//!
//! Problems from both stages are collected, so one run reports everything it
//! can find.

use std::net::Ipv6Addr;
use std::time::Duration;

use tracing::debug;

use crate::{Config, ConfigError, Section};

/// Collects validation problems, scoped to the section being checked.
#[derive(Debug, Default)]
pub struct Violations {
    scope: Option<String>,
    errors: Vec<ConfigError>,
}

impl Violations {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `section` under `scope` if it is enabled.
    pub fn check_section<S: Section>(&mut self, scope: impl Into<String>, section: &S) {
        if !section.is_enabled() {
            return;
        }
        let previous = self.scope.replace(scope.into());
        section.validate(self);
        self.scope = previous;
    }

    fn path(&self, field: &str) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}.{field}"),
            None => field.to_string(),
        }
    }

    /// Record a problem with `field`.
    pub fn invalid(&mut self, field: &str, reason: impl Into<String>) {
        let field = self.path(field);
        self.errors.push(ConfigError::invalid_value(field, reason));
    }

    /// Record a problem that is not about a single field.
    pub fn push(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// `value` must not be empty.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.invalid(field, "must be specified");
        }
    }

    /// `value` must be a `host:port` address.
    pub fn host_port(&mut self, field: &str, value: &str) {
        if let Err(reason) = check_host_port(value) {
            self.invalid(field, format!("{reason} in {value:?}"));
        }
    }

    /// `value` must be longer than zero.
    pub fn positive(&mut self, field: &str, value: Duration) {
        if value.is_zero() {
            self.invalid(field, "must be greater than zero");
        }
    }

    /// `value` must be one of `allowed`.
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.invalid(
                field,
                format!("{value:?} is not one of {}", allowed.join(", ")),
            );
        }
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Finish, folding everything recorded into one result.
    pub fn into_result(self) -> Result<(), ConfigError> {
        ConfigError::collect(self.errors)
    }
}

/// Consistency levels accepted by ingestion listeners.
pub const CONSISTENCY_LEVELS: &[&str] = &["any", "one", "quorum", "all"];

/// Check that `addr` is `host:port`.
///
/// The host may be empty (all interfaces), a name, an IPv4 address or a
/// bracketed IPv6 address with an optional `%zone`. The port must fit in 16
/// bits.
pub fn check_host_port(addr: &str) -> Result<(), String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| "missing port".to_string())?;

    if port.is_empty() {
        return Err("missing port".to_string());
    }
    port.parse::<u16>()
        .map_err(|_| format!("invalid port {port:?}"))?;

    if let Some(inner) = host.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| "unterminated IPv6 address".to_string())?;
        let addr = match inner.split_once('%') {
            Some((_, "")) => return Err(format!("empty zone in {inner:?}")),
            Some((addr, _)) => addr,
            None => inner,
        };
        addr.parse::<Ipv6Addr>()
            .map_err(|_| format!("invalid IPv6 address {inner:?}"))?;
    } else if host.contains(':') {
        return Err("IPv6 addresses must be enclosed in brackets".to_string());
    } else if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(format!("invalid host {host:?}"));
    }

    Ok(())
}

/// Validate the whole document.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut violations = Violations::new();

    for addr in config.join_addresses() {
        violations.host_port("join", addr);
    }

    violations.check_section(crate::MetaConfig::NAME, &config.meta);
    violations.check_section(crate::DataConfig::NAME, &config.data);
    violations.check_section(crate::ClusterConfig::NAME, &config.cluster);
    violations.check_section(crate::AdminConfig::NAME, &config.admin);
    violations.check_section(crate::HttpConfig::NAME, &config.http);
    for (index, graphite) in config.graphites.iter().enumerate() {
        violations.check_section(
            format!("{}[{}]", crate::GraphiteConfig::NAME, index + 1),
            graphite,
        );
    }
    violations.check_section(crate::CollectdConfig::NAME, &config.collectd);
    violations.check_section(crate::OpenTsdbConfig::NAME, &config.opentsdb);
    for (index, udp) in config.udps.iter().enumerate() {
        violations.check_section(format!("{}[{}]", crate::UdpConfig::NAME, index + 1), udp);
    }
    violations.check_section(crate::MonitoringConfig::NAME, &config.monitoring);
    violations.check_section(crate::SubscriberConfig::NAME, &config.subscriber);
    violations.check_section(
        crate::ContinuousQueryConfig::NAME,
        &config.continuous_queries,
    );
    violations.check_section(crate::MonitorConfig::NAME, &config.monitor);

    // Without any storage the monitor rule cannot be met either; report the
    // root cause only.
    if !config.meta.is_enabled() && !config.data.is_enabled() {
        violations.push(ConfigError::NoStorageConfigured);
    } else if config.monitor.store_enabled && !config.data.is_enabled() {
        violations.push(ConfigError::MonitorStoreRequiresData);
    }

    if violations.is_empty() {
        debug!("configuration is valid");
    }
    violations.into_result()
}
