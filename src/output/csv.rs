//! CSV renderer (RFC 4180 quoting).
//!
//! A list of objects becomes one row per object with a header built from
//! the union of keys in first-seen order. A single object is one row;
//! scalars go into a single `value` column. Nested values are written as
//! compact JSON.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::output::{OutputError, OutputRenderer};

const VALUE_COLUMN: &str = "value";

pub struct CsvRenderer;

impl OutputRenderer for CsvRenderer {
    fn render(&self, value: &Value) -> Result<String, OutputError> {
        let rows: Vec<Map<String, Value>> = match value {
            Value::Array(items) => items.iter().map(as_row).collect(),
            other => vec![as_row(other)],
        };
        if rows.is_empty() {
            return Ok(String::new());
        }

        let header: IndexSet<&str> = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();

        let mut out = String::new();
        push_record(&mut out, header.iter().map(|h| escape(h)));
        for row in &rows {
            push_record(
                &mut out,
                header
                    .iter()
                    .map(|key| escape(&cell(row.get(*key).unwrap_or(&Value::Null)))),
            );
        }
        Ok(out)
    }
}

fn as_row(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert(VALUE_COLUMN.to_string(), other.clone());
            map
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// Quote a field if it contains a delimiter, quote or line break.
pub fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_record(out: &mut String, fields: impl Iterator<Item = String>) {
    let record: Vec<String> = fields.collect();
    out.push_str(&record.join(","));
    out.push('\n');
}
