//! Environment variable overrides.
//!
//! After a document is decoded, every field a section registers as
//! overridable can be replaced from the environment. Keys are derived from
//! the prefix, the section name and the field name, upper-cased with `-`
//! mapped to `_`:
//!
//! - `FREETSDB_HTTP_BIND_ADDRESS` → `[http] bind-address`
//! - `FREETSDB_DATA_CACHE_MAX_MEMORY_SIZE` → `[data.cache] max-memory-size`
//! - `FREETSDB_GRAPHITE_2_PROTOCOL` → `protocol` of the second `[[graphite]]`
//!
//! Repeated sections are addressed by their 1-based position in the decoded
//! document, so decode order is override order. An index past the end of the
//! sequence addresses nothing; sequences are never grown.
//!
//! Sections opt fields in through [`Overridable`]; there is no reflection.
//! Absent or empty variables leave a field untouched. A value that does not
//! parse leaves the field untouched and is reported, and the pass carries on
//! so every bad variable shows up in one error.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use tracing::debug;

use crate::{ConfigError, Section};

/// Prefix shared by every override key unless the loader is told otherwise.
pub const DEFAULT_ENV_PREFIX: &str = "FREETSDB";

/// Source of environment variables.
///
/// Lets overrides be exercised without touching the process environment.
pub trait EnvSource {
    /// Get the value of an environment variable by name.
    fn get(&self, name: &str) -> Option<String>;

    /// Iterate over all environment variables.
    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_>;
}

/// Environment source that reads from the actual process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnv;

impl EnvSource for StdEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        Box::new(std::env::vars())
    }
}

/// Environment source backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: BTreeMap<String, String>,
}

impl MockEnv {
    /// Create a new empty mock environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock environment from key-value pairs.
    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set an environment variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl EnvSource for MockEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        Box::new(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// A field type that can be parsed from an environment variable.
pub trait FromEnv: Sized {
    /// Human readable name of the accepted format, used in errors.
    const EXPECTED: &'static str;

    /// Parse the raw variable value, `None` if it is not acceptable.
    fn from_env(value: &str) -> Option<Self>;
}

impl FromEnv for String {
    const EXPECTED: &'static str = "string";

    fn from_env(value: &str) -> Option<Self> {
        Some(value.to_string())
    }
}

impl FromEnv for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_env(value: &str) -> Option<Self> {
        parse_bool(value)
    }
}

macro_rules! from_env_via_parse {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl FromEnv for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_env(value: &str) -> Option<Self> {
                    value.trim().parse().ok()
                }
            }
        )*
    };
}

from_env_via_parse!(
    u16 => "unsigned integer",
    u32 => "unsigned integer",
    u64 => "unsigned integer",
    usize => "unsigned integer",
    i64 => "integer",
    f64 => "float",
);

impl FromEnv for Duration {
    const EXPECTED: &'static str = "duration (e.g. 10s, 1m30s)";

    fn from_env(value: &str) -> Option<Self> {
        humantime::parse_duration(value.trim()).ok()
    }
}

impl FromEnv for Vec<String> {
    const EXPECTED: &'static str = "comma-separated list";

    fn from_env(value: &str) -> Option<Self> {
        Some(
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }
}

impl<T: FromEnv> FromEnv for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_env(value: &str) -> Option<Self> {
        T::from_env(value).map(Some)
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Upper-case a section or field name and map `-` to `_`.
fn key_segment(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// A configuration struct whose fields can be overridden from the environment.
///
/// Implementations register each overridable field by name. Fields that are
/// not registered are never touched.
pub trait Overridable {
    /// Offer every overridable field to `env`.
    fn apply_overrides(&mut self, env: &mut Overrides<'_>);
}

/// One override pass over a configuration tree.
pub struct Overrides<'a> {
    env: &'a dyn EnvSource,
    prefix: String,
    path: Vec<String>,
    keys: Vec<String>,
    applied: Vec<String>,
    errors: Vec<ConfigError>,
}

impl<'a> Overrides<'a> {
    /// Start a pass reading from `env` with the given key prefix.
    pub fn new(prefix: &str, env: &'a dyn EnvSource) -> Self {
        Self {
            env,
            prefix: key_segment(prefix),
            path: Vec::new(),
            keys: Vec::new(),
            applied: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn key(&self, name: &str) -> String {
        let name = key_segment(name);
        std::iter::once(self.prefix.as_str())
            .chain(self.path.iter().map(String::as_str))
            .chain(std::iter::once(name.as_str()))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Override `slot` from the variable derived for `name`, if it is set.
    pub fn field<T: FromEnv>(&mut self, name: &str, slot: &mut T) {
        let key = self.key(name);

        if let Some(value) = self.env.get(&key).filter(|v| !v.is_empty()) {
            match T::from_env(&value) {
                Some(parsed) => {
                    *slot = parsed;
                    debug!(var = %key, "applied environment override");
                    self.applied.push(key.clone());
                }
                None => self.errors.push(ConfigError::env_parse_error(
                    &key,
                    format!("expected {}, got {value:?}", T::EXPECTED),
                )),
            }
        }

        self.keys.push(key);
    }

    /// Recurse into a nested struct, extending the key by `name`.
    pub fn nested<T: Overridable>(&mut self, name: &str, value: &mut T) {
        self.path.push(key_segment(name));
        value.apply_overrides(self);
        self.path.pop();
    }

    /// Recurse into a singleton section.
    pub fn section<S: Section>(&mut self, section: &mut S) {
        self.nested(S::NAME, section);
    }

    /// Recurse into every element of a repeated section.
    ///
    /// Element `i` (0-based) is addressed as `PREFIX_SECTION_{i + 1}_FIELD`.
    pub fn repeated<S: Section>(&mut self, sections: &mut [S]) {
        self.path.push(key_segment(S::NAME));
        for (index, section) in sections.iter_mut().enumerate() {
            self.path.push((index + 1).to_string());
            section.apply_overrides(self);
            self.path.pop();
        }
        self.path.pop();
    }

    /// Every key derived so far, in visiting order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// End the pass, reporting every variable that failed to parse.
    pub fn finish(self) -> Result<OverrideReport, ConfigError> {
        if !self.prefix.is_empty() {
            let known: HashSet<&str> = self.keys.iter().map(String::as_str).collect();
            let prefix = format!("{}_", self.prefix);
            for (name, _) in self.env.vars() {
                if name.starts_with(&prefix) && !known.contains(name.as_str()) {
                    debug!(var = %name, "environment variable matches no configuration field");
                }
            }
        }

        ConfigError::collect(self.errors)?;

        Ok(OverrideReport {
            applied: self.applied,
        })
    }
}

/// Outcome of a successful override pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideReport {
    /// Keys whose values replaced a field, in visiting order.
    pub applied: Vec<String>,
}

/// Apply environment overrides to `target`.
pub fn apply_env_overrides<T: Overridable>(
    target: &mut T,
    prefix: &str,
    env: &dyn EnvSource,
) -> Result<OverrideReport, ConfigError> {
    let mut overrides = Overrides::new(prefix, env);
    target.apply_overrides(&mut overrides);
    overrides.finish()
}
