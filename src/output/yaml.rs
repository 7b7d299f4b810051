//! YAML renderer.

use serde_json::Value;

use crate::output::{OutputError, OutputRenderer};

pub struct YamlRenderer;

impl OutputRenderer for YamlRenderer {
    fn render(&self, value: &Value) -> Result<String, OutputError> {
        Ok(serde_yaml_ng::to_string(value)?)
    }
}
