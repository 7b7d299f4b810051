//! JSON and plain-text renderers.

use serde_json::Value;

use crate::output::{OutputError, OutputRenderer};

/// Pretty-printed JSON.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, value: &Value) -> Result<String, OutputError> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

/// Strings as-is, everything else as pretty JSON.
pub struct TextRenderer;

impl OutputRenderer for TextRenderer {
    fn render(&self, value: &Value) -> Result<String, OutputError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => JsonRenderer.render(other),
        }
    }
}
