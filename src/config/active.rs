//! The active configuration: one value and one source per known key.

use std::fmt;

use indexmap::IndexMap;
use serde_yaml_ng::Value;

use crate::config::history::{ConfigHistory, ConfigSource};
use crate::constants::CONFIG_KEYS;

/// Sentinel for "no value found anywhere".
///
/// Equal to `None` and to every other `Missing`; never truthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Missing;

impl Missing {
    pub fn as_bool(self) -> bool {
        false
    }
}

impl<T> PartialEq<Option<T>> for Missing {
    fn eq(&self, other: &Option<T>) -> bool {
        other.is_none()
    }
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing()")
    }
}

/// A raw configuration value, or [`Missing`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Missing,
    Value(Value),
}

impl ConfigValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigValue::Missing)
    }

    /// Missing or explicitly `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Missing | ConfigValue::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConfigValue::Value(v) => Some(v),
            ConfigValue::Missing => None,
        }
    }

    /// YAML-flavoured truthiness: missing, null, `false`, zero and empty
    /// strings or collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Missing => Missing.as_bool(),
            ConfigValue::Value(v) => match v {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::String(s) => !s.is_empty(),
                Value::Sequence(s) => !s.is_empty(),
                Value::Mapping(m) => !m.is_empty(),
                Value::Tagged(t) => ConfigValue::Value(t.value.clone()).is_truthy(),
            },
        }
    }

    /// Human-readable type name used in warnings.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Missing => "missing",
            ConfigValue::Value(v) => match v {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Sequence(_) => "list",
                Value::Mapping(_) => "mapping",
                Value::Tagged(_) => "tagged value",
            },
        }
    }
}

impl From<Option<Value>> for ConfigValue {
    fn from(value: Option<Value>) -> Self {
        value.map_or(ConfigValue::Missing, ConfigValue::Value)
    }
}

impl PartialEq<Missing> for ConfigValue {
    fn eq(&self, _other: &Missing) -> bool {
        self.is_missing()
    }
}

impl<T> PartialEq<Option<T>> for ConfigValue
where
    Value: PartialEq<T>,
{
    fn eq(&self, other: &Option<T>) -> bool {
        match (self, other) {
            (ConfigValue::Missing, None) => true,
            (ConfigValue::Value(v), Some(o)) => v == o,
            _ => false,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Missing => write!(f, "{Missing}"),
            ConfigValue::Value(Value::String(s)) => write!(f, "{s}"),
            ConfigValue::Value(Value::Null) => write!(f, "null"),
            ConfigValue::Value(v) => {
                let text = serde_json::to_string(v).map_err(|_| fmt::Error)?;
                write!(f, "{text}")
            }
        }
    }
}

/// A value together with the layer that supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedConfigIdentity {
    pub value: ConfigValue,
    pub source: ConfigSource,
}

impl AppliedConfigIdentity {
    pub fn new(value: ConfigValue, source: ConfigSource) -> Self {
        Self { value, source }
    }

    pub fn missing() -> Self {
        Self::new(ConfigValue::Missing, ConfigSource::Default)
    }
}

/// Snapshot of every known key, resolved from [`ConfigHistory`].
///
/// Built once per process; afterwards only validators patch it when they
/// fall back to a default.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimalActiveConfiguration {
    entries: IndexMap<String, AppliedConfigIdentity>,
}

impl MinimalActiveConfiguration {
    pub fn from_history(history: &ConfigHistory) -> Self {
        let mut entries = IndexMap::new();
        for key in CONFIG_KEYS {
            let identity = match (history.get(key), history.provenance(key)) {
                (Some(value), Some(source)) => {
                    AppliedConfigIdentity::new(ConfigValue::Value(value.clone()), source.clone())
                }
                _ => AppliedConfigIdentity::missing(),
            };
            entries.insert((*key).to_string(), identity);
        }

        for key in history.merged().keys().filter_map(Value::as_str) {
            if !entries.contains_key(key) {
                tracing::debug!(key, "ignoring unknown configuration key");
            }
        }

        Self { entries }
    }

    /// Look up a key. Unknown keys report as missing.
    pub fn get(&self, key: &str) -> AppliedConfigIdentity {
        self.entries
            .get(&key.to_lowercase())
            .cloned()
            .unwrap_or_else(AppliedConfigIdentity::missing)
    }

    pub fn value(&self, key: &str) -> ConfigValue {
        self.get(key).value
    }

    pub fn source(&self, key: &str) -> ConfigSource {
        self.get(key).source
    }

    /// Replace a key's value, e.g. with a validator fallback.
    pub fn patch(&mut self, key: &str, value: Value, source: ConfigSource) {
        self.entries.insert(
            key.to_lowercase(),
            AppliedConfigIdentity::new(ConfigValue::Value(value), source),
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AppliedConfigIdentity)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
