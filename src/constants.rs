//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and configuration keys so a rename only requires changing this file.

use std::time::Duration;

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "elapi";

/// Crate version, embedded at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent header sent with every API request.
pub const USER_AGENT: &str = concat!("elapi/", env!("CARGO_PKG_VERSION"));

/// Config file name, looked up in `/etc`, the user config dir and the cwd.
pub const CONFIG_FILENAME: &str = "elapi.yaml";

/// System-wide config directory.
pub const SYSTEM_CONFIG_DIR: &str = "/etc";

/// Source label for values that no file, env var or CLI flag supplied.
pub const DEFAULT_SOURCE: &str = "DEFAULT";

/// Maximum number of concurrent connections during async fan-out.
pub const MAX_CONNECTIONS: usize = 100;

/// Name of the sentinel file used to probe directory writability.
pub const WRITE_PROBE_FILENAME: &str = ".elapi_write_probe";

// ── Environment variable names ──────────────────────────────────────

/// Prefix for `ELAPI_<KEY>` configuration overrides.
pub const ENV_PREFIX: &str = "ELAPI_";
/// Selects a named environment section inside config files.
pub const ENV_SWITCH: &str = "ELAPI_ENV";
/// Log filter directive (tracing `EnvFilter` syntax).
pub const ENV_LOG: &str = "ELAPI_LOG";
pub const ENV_XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
pub const ENV_XDG_DATA_HOME: &str = "XDG_DATA_HOME";
pub const ENV_XDG_DOWNLOAD_DIR: &str = "XDG_DOWNLOAD_DIR";
pub const ENV_HOME: &str = "HOME";

// ── Configuration keys ──────────────────────────────────────────────

pub const KEY_HOST: &str = "host";
pub const KEY_API_TOKEN: &str = "api_token";
pub const KEY_EXPORT_DIR: &str = "export_dir";
pub const KEY_UNSAFE_TOKEN_WARNING: &str = "unsafe_api_token_warning";
pub const KEY_ENABLE_HTTP2: &str = "enable_http2";
pub const KEY_VERIFY_SSL: &str = "verify_ssl";
pub const KEY_TIMEOUT: &str = "timeout";
pub const KEY_DEVELOPMENT_MODE: &str = "development_mode";
pub const KEY_PLUGIN: &str = "plugin";

/// Every key tracked by the active configuration, in display order.
pub const CONFIG_KEYS: &[&str] = &[
    KEY_HOST,
    KEY_API_TOKEN,
    KEY_EXPORT_DIR,
    KEY_UNSAFE_TOKEN_WARNING,
    KEY_ENABLE_HTTP2,
    KEY_VERIFY_SSL,
    KEY_TIMEOUT,
    KEY_DEVELOPMENT_MODE,
    KEY_PLUGIN,
];

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_UNSAFE_TOKEN_WARNING: bool = true;
pub const DEFAULT_ENABLE_HTTP2: bool = false;
pub const DEFAULT_VERIFY_SSL: bool = true;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_DEVELOPMENT_MODE: bool = false;
