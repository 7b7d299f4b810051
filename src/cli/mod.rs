//! CLI command definitions and terminal output helpers.

pub mod args;

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde_json::{Value, json};

use elapi::config::{ApiToken, ConfigContext, ConfigValue};
use elapi::constants::KEY_API_TOKEN;
use elapi::error::ValidationError;
use elapi::output::{self, Format};

use args::OutputArgs;

/// Print rendered output, or export it when `--export` was given.
///
/// `export_dir` is only consulted when exporting without a path.
pub fn emit(
    rendered: &str,
    output: &OutputArgs,
    stub: &str,
    export_dir: impl FnOnce() -> Result<PathBuf, ValidationError>,
) -> anyhow::Result<()> {
    match &output.export {
        Some(target) => {
            let default_dir = match target {
                Some(_) => PathBuf::new(),
                None => export_dir()?,
            };
            let path = output::export::write_export(
                target.as_deref(),
                &default_dir,
                stub,
                output.format,
                rendered,
            )?;
            println!("{}", path.display());
        }
        None => print_rendered(rendered, output.format, output.highlight),
    }
    Ok(())
}

pub fn print_rendered(rendered: &str, format: Format, highlight: bool) {
    let text = rendered.trim_end_matches('\n');
    if text.is_empty() {
        return;
    }
    if highlight && std::io::stdout().is_terminal() {
        println!("{}", output::highlight(text, format));
    } else {
        println!("{text}");
    }
}

fn display_value(key: &str, value: &ConfigValue) -> String {
    match value.as_value() {
        Some(serde_yaml_ng::Value::String(token)) if key == KEY_API_TOKEN => {
            ApiToken::new(token.clone()).masked()
        }
        _ => value.to_string(),
    }
}

/// Active configuration as `[{key, value, source}]`, token masked.
pub fn config_rows(ctx: &ConfigContext) -> Value {
    ctx.active
        .iter()
        .map(|(key, identity)| {
            json!({
                "key": key,
                "value": display_value(key, &identity.value),
                "source": identity.source.to_string(),
            })
        })
        .collect()
}

/// Human-readable `show-config` table.
pub fn config_table(ctx: &ConfigContext) -> String {
    let width = ctx.active.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, identity) in ctx.active.iter() {
        let value = display_value(key, &identity.value);
        let value = if identity.value.is_missing() {
            value.red().to_string()
        } else {
            value
        };
        let _ = writeln!(
            out,
            "{}  {}  {}",
            format!("{key:<width$}").bold(),
            value,
            format!("({})", identity.source).dimmed(),
        );
    }

    let _ = writeln!(out);
    let files = ctx.history.files();
    if files.is_empty() {
        let _ = writeln!(out, "{}", "No configuration files found.".dimmed());
    } else {
        let _ = writeln!(out, "{}", "Configuration files:".bold());
        for file in files {
            let _ = writeln!(out, "  {}", file.display());
        }
    }
    out
}

/// Remove `dir` if it exists. Returns whether anything was removed.
pub fn remove_dir_if_exists(dir: &Path) -> std::io::Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
