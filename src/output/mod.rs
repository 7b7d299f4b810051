//! Output renderers: JSON, YAML, CSV and plain text, plus highlighting
//! and export to files.

pub mod csv;
pub mod export;
pub mod highlight;
pub mod json;
pub mod yaml;

use std::path::PathBuf;

use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

pub use highlight::highlight;

/// Errors while rendering or writing output.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Path(#[from] crate::error::PathValidationError),
}

/// Output format. Parsing is case-insensitive and accepts `yml` for YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    #[strum(to_string = "yaml", serialize = "yml")]
    Yaml,
    Csv,
    Txt,
}

impl Format {
    /// File extension used for exports.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Csv => "csv",
            Format::Txt => "txt",
        }
    }

    pub fn renderer(self) -> &'static dyn OutputRenderer {
        match self {
            Format::Json => &json::JsonRenderer,
            Format::Yaml => &yaml::YamlRenderer,
            Format::Csv => &csv::CsvRenderer,
            Format::Txt => &json::TextRenderer,
        }
    }
}

/// Trait for rendering API data to an output format.
pub trait OutputRenderer {
    fn render(&self, value: &Value) -> Result<String, OutputError>;
}

/// Render `value` in `format`.
pub fn format_value(value: &Value, format: Format) -> Result<String, OutputError> {
    format.renderer().render(value)
}

/// Render a raw response body. Non-JSON bodies pass through unchanged
/// so error pages and plain-text endpoints are still shown.
pub fn format_body(body: &str, format: Format) -> Result<String, OutputError> {
    if body.trim().is_empty() {
        return Ok(String::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => format_value(&value, format),
        Err(_) => Ok(body.to_string()),
    }
}
