//! Syntax highlighting for JSON and YAML output.

use std::sync::LazyLock;

use colored::Colorize;
use regex::{Captures, Regex};

use crate::output::Format;

static JSON_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<key>"(?:\\.|[^"\\])*")(?P<colon>\s*:)|(?P<str>"(?:\\.|[^"\\])*")|(?P<lit>\b(?:true|false|null)\b)|(?P<num>-?\b\d+(?:\.\d+)?(?:[eE][+-]?\d+)?\b)"#,
    )
    .expect("static regex is valid")
});

static YAML_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*(?:-\s+)?)(?P<key>[^\s:#'][^:#]*?|'[^']*'|\x22[^\x22]*\x22)(?P<colon>:)(?P<rest>\s.*|$)")
        .expect("static regex is valid")
});

/// Colour keys, strings, numbers and literals. CSV and text are returned
/// unchanged.
pub fn highlight(text: &str, format: Format) -> String {
    match format {
        Format::Json => highlight_json(text),
        Format::Yaml => text
            .split_inclusive('\n')
            .map(highlight_yaml_line)
            .collect(),
        Format::Csv | Format::Txt => text.to_string(),
    }
}

fn highlight_json(text: &str) -> String {
    JSON_TOKEN_RE
        .replace_all(text, |caps: &Captures<'_>| {
            if let Some(key) = caps.name("key") {
                let colon = caps.name("colon").map_or("", |m| m.as_str());
                format!("{}{colon}", key.as_str().blue().bold())
            } else if let Some(s) = caps.name("str") {
                s.as_str().green().to_string()
            } else if let Some(lit) = caps.name("lit") {
                lit.as_str().yellow().to_string()
            } else {
                caps[0].cyan().to_string()
            }
        })
        .into_owned()
}

fn highlight_yaml_line(line: &str) -> String {
    let (body, newline) = match line.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (line, ""),
    };
    match YAML_KEY_RE.captures(body) {
        Some(caps) => {
            let rest = caps.name("rest").map_or("", |m| m.as_str());
            let value = rest.trim_start();
            let spacing = &rest[..rest.len() - value.len()];
            format!(
                "{}{}:{spacing}{}{newline}",
                &caps["indent"],
                caps["key"].blue().bold(),
                yaml_scalar(value)
            )
        }
        None => match body.trim_start().strip_prefix("- ") {
            Some(item) => {
                let prefix = &body[..body.len() - item.len()];
                format!("{prefix}{}{newline}", yaml_scalar(item))
            }
            None => format!("{}{newline}", yaml_scalar(body)),
        },
    }
}

fn yaml_scalar(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    match value {
        "true" | "false" | "null" | "~" => value.yellow().to_string(),
        _ if value.parse::<f64>().is_ok() => value.cyan().to_string(),
        _ if value.starts_with(['|', '>', '[', '{']) => value.to_string(),
        _ => value.green().to_string(),
    }
}
