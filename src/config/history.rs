//! Layered settings loader.
//!
//! Priority (highest to lowest):
//! 1. CLI `--override` mappings
//! 2. `ELAPI_<KEY>` environment variables
//! 3. `./elapi.yaml` (project)
//! 4. `$XDG_CONFIG_HOME/elapi.yaml` or `~/.config/elapi.yaml` (user)
//! 5. `/etc/elapi.yaml` (system)
//!
//! Every layer that was actually found is recorded as a history entry so
//! the origin of each active value can be reported later.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};
use thiserror::Error;

use crate::config::paths::ConfigLocations;
use crate::constants::{
    DEFAULT_SOURCE, ENV_LOG, ENV_PREFIX, ENV_SWITCH, KEY_API_TOKEN, KEY_EXPORT_DIR, KEY_HOST,
};
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },

    #[error("config file {path} must contain a key-value mapping at the top level")]
    NotAMapping { path: PathBuf },

    #[error("invalid override {input:?}: {reason}")]
    InvalidOverride { input: String, reason: String },
}

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigSource {
    File(PathBuf),
    Env,
    Cli,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Env => write!(f, "ENV"),
            ConfigSource::Cli => write!(f, "CLI"),
            ConfigSource::Default => write!(f, "{DEFAULT_SOURCE}"),
        }
    }
}

/// One layer of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub source: ConfigSource,
    pub snapshot: Mapping,
}

/// Ordered configuration layers, lowest precedence first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigHistory {
    entries: Vec<HistoryEntry>,
}

impl ConfigHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all layers: config files, then env vars, then CLI overrides.
    pub fn load(
        locations: &ConfigLocations,
        env: &Env,
        cli_overrides: &[Mapping],
    ) -> Result<Self, ConfigError> {
        let env_name = env.non_empty(ENV_SWITCH).map(|n| n.to_lowercase());
        let mut history = Self::new();

        for path in locations.ordered() {
            if let Some(snapshot) = Self::load_file(path, env_name.as_deref())? {
                tracing::debug!(path = %path.display(), keys = snapshot.len(), "loaded config file");
                history.push(ConfigSource::File(path.to_path_buf()), snapshot);
            }
        }

        let env_layer = Self::env_overrides(env);
        if !env_layer.is_empty() {
            history.push(ConfigSource::Env, env_layer);
        }

        let mut cli_layer = Mapping::new();
        for overrides in cli_overrides {
            for (key, value) in normalize_keys(overrides.clone()) {
                cli_layer.insert(key, value);
            }
        }
        if !cli_layer.is_empty() {
            history.push(ConfigSource::Cli, cli_layer);
        }

        Ok(history)
    }

    /// Load one YAML config file. Returns `None` if it does not exist.
    ///
    /// When `env_name` is set and the file has a mapping under that key,
    /// its entries are merged over the file's flat keys.
    pub fn load_file(path: &Path, env_name: Option<&str>) -> Result<Option<Mapping>, ConfigError> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let value: Value = serde_yaml_ng::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mapping = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(m) => normalize_keys(m),
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: path.to_path_buf(),
                });
            }
        };

        Ok(Some(apply_env_section(mapping, env_name)))
    }

    /// Collect `ELAPI_<KEY>` overrides from the environment.
    pub fn env_overrides(env: &Env) -> Mapping {
        let mut layer = Mapping::new();
        for (name, raw) in env.vars() {
            if name == ENV_SWITCH || name == ENV_LOG {
                continue;
            }
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let key = key.to_lowercase();
            let value = parse_env_value(&key, &raw);
            layer.insert(Value::String(key), value);
        }
        layer
    }

    /// Append a layer. Keys are lower-cased.
    pub fn push(&mut self, source: ConfigSource, snapshot: Mapping) {
        self.entries.push(HistoryEntry {
            source,
            snapshot: normalize_keys(snapshot),
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> Vec<&ConfigSource> {
        self.entries.iter().map(|e| &e.source).collect()
    }

    /// Config files that were found, in ascending precedence.
    pub fn files(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter_map(|e| match &e.source {
                ConfigSource::File(p) => Some(p.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Flatten all layers; later layers override earlier ones.
    pub fn merged(&self) -> Mapping {
        let mut merged = Mapping::new();
        for entry in &self.entries {
            for (key, value) in &entry.snapshot {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// The effective value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .rev()
            .find_map(|e| e.snapshot.get(key.as_str()))
    }

    /// The last layer that defined `key`.
    pub fn provenance(&self, key: &str) -> Option<&ConfigSource> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .rev()
            .find(|e| e.snapshot.contains_key(key.as_str()))
            .map(|e| &e.source)
    }
}

/// Parse a `--override` argument: a YAML (or JSON) mapping.
pub fn parse_override(input: &str) -> Result<Mapping, ConfigError> {
    let value: Value = serde_yaml_ng::from_str(input).map_err(|e| ConfigError::InvalidOverride {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Mapping(m) => Ok(normalize_keys(m)),
        _ => Err(ConfigError::InvalidOverride {
            input: input.to_string(),
            reason: "expected a mapping such as '{timeout: 10}'".to_string(),
        }),
    }
}

fn normalize_keys(mapping: Mapping) -> Mapping {
    mapping
        .into_iter()
        .filter_map(|(key, value)| {
            let key = match key {
                Value::String(s) => s.to_lowercase(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    tracing::warn!(key = ?other, "ignoring configuration key that is not a scalar");
                    return None;
                }
            };
            Some((Value::String(key), value))
        })
        .collect()
}

fn apply_env_section(mut mapping: Mapping, env_name: Option<&str>) -> Mapping {
    let Some(name) = env_name else {
        return mapping;
    };
    match mapping.remove(name) {
        Some(Value::Mapping(section)) => {
            for (key, value) in normalize_keys(section) {
                mapping.insert(key, value);
            }
        }
        Some(other) => {
            tracing::warn!(env = name, value = ?other, "environment section is not a mapping, ignoring it");
        }
        None => {}
    }
    mapping
}

/// Env values are parsed as YAML scalars so `true` and `30` keep their
/// types. String-typed keys are always taken verbatim.
fn parse_env_value(key: &str, raw: &str) -> Value {
    if matches!(key, KEY_HOST | KEY_API_TOKEN | KEY_EXPORT_DIR) || raw.trim().is_empty() {
        return Value::String(raw.to_string());
    }
    serde_yaml_ng::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
