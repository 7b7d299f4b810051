//! Typed settings and the per-process configuration context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde_yaml_ng::Mapping;

use crate::config::active::MinimalActiveConfiguration;
use crate::config::history::{ConfigError, ConfigHistory};
use crate::config::paths::ConfigLocations;
use crate::config::token::ApiToken;
use crate::config::validators::{
    validate_api_token, validate_bool, validate_export_dir, validate_host, validate_plugin_config,
    validate_seconds,
};
use crate::constants::{
    DEFAULT_DEVELOPMENT_MODE, DEFAULT_ENABLE_HTTP2, DEFAULT_TIMEOUT,
    DEFAULT_UNSAFE_TOKEN_WARNING, DEFAULT_VERIFY_SSL, KEY_DEVELOPMENT_MODE, KEY_ENABLE_HTTP2,
    KEY_TIMEOUT, KEY_UNSAFE_TOKEN_WARNING, KEY_VERIFY_SSL,
};
use crate::env::Env;
use crate::error::ValidationError;

/// Fully validated settings needed to talk to the API.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub api_token: ApiToken,
    pub export_dir: PathBuf,
    pub unsafe_api_token_warning: bool,
    pub enable_http2: bool,
    pub verify_ssl: bool,
    pub timeout: Duration,
    pub development_mode: bool,
    pub plugins: IndexMap<String, Mapping>,
}

impl Settings {
    /// Run every validator. Stops at the first critical error; fallbacks
    /// are patched into `active` as they are applied.
    pub fn validate(
        active: &mut MinimalActiveConfiguration,
        env: &Env,
        locations: &ConfigLocations,
    ) -> Result<Self, ValidationError> {
        let development_mode =
            validate_bool(active, KEY_DEVELOPMENT_MODE, DEFAULT_DEVELOPMENT_MODE)?;
        let unsafe_api_token_warning =
            validate_bool(active, KEY_UNSAFE_TOKEN_WARNING, DEFAULT_UNSAFE_TOKEN_WARNING)?;
        let host = validate_host(active)?;
        let api_token = validate_api_token(active, &locations.project, unsafe_api_token_warning)?;
        let enable_http2 = validate_bool(active, KEY_ENABLE_HTTP2, DEFAULT_ENABLE_HTTP2)?;
        let verify_ssl = validate_bool(active, KEY_VERIFY_SSL, DEFAULT_VERIFY_SSL)?;
        let timeout = validate_seconds(active, KEY_TIMEOUT, DEFAULT_TIMEOUT)?;
        let export_dir = validate_export_dir(active, env)?;
        let plugins = validate_plugin_config(active)?;

        if !verify_ssl {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            host,
            api_token,
            export_dir,
            unsafe_api_token_warning,
            enable_http2,
            verify_ssl,
            timeout,
            development_mode,
            plugins,
        })
    }

    /// The configuration section of one plugin, empty if absent.
    pub fn plugin(&self, name: &str) -> Mapping {
        self.plugins.get(name).cloned().unwrap_or_default()
    }
}

/// Everything resolved from the config files, env and CLI at startup.
///
/// Built once in `main` and passed to every command.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    pub env: Env,
    pub locations: ConfigLocations,
    pub history: ConfigHistory,
    pub active: MinimalActiveConfiguration,
}

impl ConfigContext {
    pub fn load(env: Env, cwd: &Path, cli_overrides: &[Mapping]) -> Result<Self, ConfigError> {
        let locations = ConfigLocations::discover(&env, cwd);
        Self::load_from(env, locations, cli_overrides)
    }

    pub fn load_from(
        env: Env,
        locations: ConfigLocations,
        cli_overrides: &[Mapping],
    ) -> Result<Self, ConfigError> {
        let history = ConfigHistory::load(&locations, &env, cli_overrides)?;
        if history.files().is_empty() {
            tracing::debug!("no configuration file found");
        }
        let active = MinimalActiveConfiguration::from_history(&history);
        Ok(Self {
            env,
            locations,
            history,
            active,
        })
    }

    /// Validate everything needed for API access.
    pub fn settings(&mut self) -> Result<Settings, ValidationError> {
        Settings::validate(&mut self.active, &self.env, &self.locations)
    }

    /// Patch the defaults of every optional key, leaving `host` and
    /// `api_token` unchecked. An export directory that cannot be resolved
    /// is logged and stays `Missing`.
    pub fn resolve_defaults(&mut self) -> Result<(), ValidationError> {
        for (key, default) in [
            (KEY_DEVELOPMENT_MODE, DEFAULT_DEVELOPMENT_MODE),
            (KEY_UNSAFE_TOKEN_WARNING, DEFAULT_UNSAFE_TOKEN_WARNING),
            (KEY_ENABLE_HTTP2, DEFAULT_ENABLE_HTTP2),
            (KEY_VERIFY_SSL, DEFAULT_VERIFY_SSL),
        ] {
            validate_bool(&mut self.active, key, default)?;
        }
        validate_seconds(&mut self.active, KEY_TIMEOUT, DEFAULT_TIMEOUT)?;
        if let Err(err) = validate_export_dir(&mut self.active, &self.env) {
            tracing::warn!(error = %err, "no writable export directory");
        }
        validate_plugin_config(&self.active)?;
        Ok(())
    }

    /// Plugin sections only, for commands that never reach the API.
    pub fn plugin(&self, name: &str) -> Result<Mapping, ValidationError> {
        Ok(validate_plugin_config(&self.active)?
            .swap_remove(name)
            .unwrap_or_default())
    }

    /// The export directory alone, for commands that never reach the API.
    pub fn export_dir(&mut self) -> Result<PathBuf, ValidationError> {
        validate_export_dir(&mut self.active, &self.env)
    }

    pub fn development_mode(&self) -> bool {
        self.active.value(KEY_DEVELOPMENT_MODE).is_truthy()
    }
}
