//! Configuration loading, layering and validation.
//!
//! Files, `ELAPI_*` environment variables and `--override` flags are
//! merged into a [`ConfigHistory`], resolved once into a
//! [`MinimalActiveConfiguration`] and validated into [`Settings`].

pub mod active;
pub mod history;
pub mod paths;
pub mod settings;
pub mod token;
pub mod validators;

pub use active::{AppliedConfigIdentity, ConfigValue, MinimalActiveConfiguration, Missing};
pub use history::{ConfigError, ConfigHistory, ConfigSource, parse_override};
pub use paths::ConfigLocations;
pub use settings::{ConfigContext, Settings};
pub use token::ApiToken;
