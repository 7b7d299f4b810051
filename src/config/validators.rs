//! Field validators over the active configuration.
//!
//! Validators never panic and never exit: fatal problems come back as
//! [`ValidationError::Critical`], recoverable ones are logged and replaced
//! by a default that is patched into the active configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};

use crate::config::active::MinimalActiveConfiguration;
use crate::config::history::ConfigSource;
use crate::config::paths::{download_dir_candidates, expand_path};
use crate::config::token::ApiToken;
use crate::constants::{CONFIG_FILENAME, KEY_API_TOKEN, KEY_EXPORT_DIR, KEY_HOST, KEY_PLUGIN};
use crate::env::Env;
use crate::error::ValidationError;
use crate::path_validator::PathValidator;
use crate::plugins;

/// A required, non-empty string value.
fn required_string(
    active: &MinimalActiveConfiguration,
    key: &str,
    example: &str,
) -> Result<String, ValidationError> {
    let identity = active.get(key);
    let note = format!("Set `{key}` in {CONFIG_FILENAME}, for example `{key}: {example}`.");

    match identity.value.as_value() {
        None | Some(Value::Null) => {
            Err(ValidationError::critical(format!("`{key}` is missing")).with_note(note))
        }
        Some(Value::String(s)) if s.trim().is_empty() => Err(ValidationError::critical(format!(
            "`{key}` is empty (from {})",
            identity.source
        ))
        .with_note(note)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::critical(format!(
            "`{key}` must be a string, got {} (from {})",
            identity.value.type_name(),
            identity.source
        ))
        .with_note(note)),
    }
}

pub fn validate_host(active: &MinimalActiveConfiguration) -> Result<String, ValidationError> {
    required_string(active, KEY_HOST, "https://elab.example.org/api/v2")
}

/// Validates the token. Tokens read from the project config file trigger a
/// warning when `warn_unsafe` is on, since project directories tend to be
/// shared or committed.
pub fn validate_api_token(
    active: &MinimalActiveConfiguration,
    project_file: &Path,
    warn_unsafe: bool,
) -> Result<ApiToken, ValidationError> {
    let token = ApiToken::new(required_string(active, KEY_API_TOKEN, "<your api key>")?);
    if warn_unsafe && active.source(KEY_API_TOKEN) == ConfigSource::File(project_file.to_path_buf()) {
        tracing::warn!(
            file = %project_file.display(),
            "api_token is stored in the project directory, which is unsafe; move it to the \
             user config or set unsafe_api_token_warning: false to silence this warning"
        );
    }
    Ok(token)
}

/// Resolve a writable export directory.
///
/// The configured `export_dir` is tried first. Otherwise the download
/// directory candidates are probed and the winner is patched in with
/// source `DEFAULT`.
pub fn validate_export_dir(
    active: &mut MinimalActiveConfiguration,
    env: &Env,
) -> Result<PathBuf, ValidationError> {
    let identity = active.get(KEY_EXPORT_DIR);
    match identity.value.as_value() {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) if raw.trim().is_empty() => {
            tracing::warn!(source = %identity.source, "export_dir is empty, using the download directory");
        }
        Some(Value::String(raw)) => {
            let expanded = expand_path(raw, env);
            match PathValidator::new([&expanded]).directories().validate() {
                Ok(path) => return Ok(path),
                Err(err) => tracing::warn!(
                    path = %expanded.display(),
                    error = %err,
                    "export_dir is not writable, using the download directory"
                ),
            }
        }
        Some(_) => tracing::warn!(
            source = %identity.source,
            "export_dir must be a string, got {}; using the download directory",
            identity.value.type_name()
        ),
    }

    let path = PathValidator::new(download_dir_candidates(env))
        .directories()
        .validate()?;
    active.patch(
        KEY_EXPORT_DIR,
        Value::String(path.display().to_string()),
        ConfigSource::Default,
    );
    Ok(path)
}

pub fn validate_bool(
    active: &mut MinimalActiveConfiguration,
    key: &str,
    default: bool,
) -> Result<bool, ValidationError> {
    let identity = active.get(key);
    match identity.value.as_value() {
        Some(Value::Bool(b)) => return Ok(*b),
        None | Some(Value::Null) => {}
        Some(_) => tracing::warn!(
            key,
            source = %identity.source,
            "expected true or false, got {}; using default {default}",
            identity.value.type_name()
        ),
    }
    active.patch(key, Value::Bool(default), ConfigSource::Default);
    Ok(default)
}

/// A non-negative number (int or float).
pub fn validate_number(
    active: &mut MinimalActiveConfiguration,
    key: &str,
    default: f64,
) -> Result<f64, ValidationError> {
    let identity = active.get(key);
    match identity.value.as_value() {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => return Ok(f),
            _ => tracing::warn!(key, value = %n, "expected a non-negative number; using default {default}"),
        },
        None | Some(Value::Null) => {}
        Some(_) => tracing::warn!(
            key,
            source = %identity.source,
            "expected a number, got {}; using default {default}",
            identity.value.type_name()
        ),
    }
    active.patch(key, number_value(default), ConfigSource::Default);
    Ok(default)
}

/// A duration in seconds. Values too large for a [`Duration`] count as
/// invalid and fall back to `default`.
pub fn validate_seconds(
    active: &mut MinimalActiveConfiguration,
    key: &str,
    default: Duration,
) -> Result<Duration, ValidationError> {
    let secs = validate_number(active, key, default.as_secs_f64())?;
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Ok(duration),
        Err(err) => {
            tracing::warn!(
                key,
                value = secs,
                "{err}; using default {}",
                default.as_secs_f64()
            );
            active.patch(key, number_value(default.as_secs_f64()), ConfigSource::Default);
            Ok(default)
        }
    }
}

/// Whole numbers are stored as integers so they display without `.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&n) {
        Value::Number((n as u64).into())
    } else {
        Value::Number(n.into())
    }
}

/// Per-plugin configuration sections under `plugin`.
pub fn validate_plugin_config(
    active: &MinimalActiveConfiguration,
) -> Result<IndexMap<String, Mapping>, ValidationError> {
    let identity = active.get(KEY_PLUGIN);
    let sections = match identity.value.as_value() {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Mapping(m)) => m,
        Some(_) => {
            tracing::warn!(
                source = %identity.source,
                "`plugin` must be a mapping of plugin names, got {}; ignoring it",
                identity.value.type_name()
            );
            return Ok(IndexMap::new());
        }
    };

    let mut plugin_configs = IndexMap::new();
    for (name, section) in sections {
        let Some(name) = name.as_str() else {
            tracing::warn!(key = ?name, "ignoring plugin section with a non-string name");
            continue;
        };
        let Value::Mapping(section) = section else {
            tracing::warn!(plugin = name, "plugin configuration must be a mapping; ignoring it");
            continue;
        };
        match plugins::find(name) {
            Some(plugin) => {
                for warning in plugin.validate_config(section) {
                    tracing::warn!(plugin = name, "{warning}");
                }
            }
            None => tracing::warn!(plugin = name, "configuration found for an unknown plugin"),
        }
        plugin_configs.insert(name.to_string(), section.clone());
    }
    Ok(plugin_configs)
}
