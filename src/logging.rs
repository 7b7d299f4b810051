//! Logging setup.
//!
//! All log output goes to stderr so stdout carries only command payloads
//! (API responses, tables, config listings).

use std::fmt;
use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::constants::ENV_LOG;
use crate::env::Env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Raw `ELAPI_LOG` directive; overrides `level` when set.
    pub directive: Option<String>,
    pub ansi: bool,
}

impl LogConfig {
    pub fn from_env(env: &Env, debug: bool) -> Self {
        Self {
            level: if debug { LogLevel::Debug } else { LogLevel::Info },
            directive: env.non_empty(ENV_LOG),
            ansi: std::io::stderr().is_terminal(),
        }
    }

    pub fn filter(&self) -> EnvFilter {
        self.directive
            .as_deref()
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.to_string()))
    }
}

/// Install the global subscriber. Call once, before any logging.
pub fn init_logging(config: &LogConfig) {
    let fmt_layer = tracing_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(config.ansi)
        .without_time();

    let result = tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init();
    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}
