//! Clap argument types and input parsing.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use serde_yaml_ng::Mapping;

use elapi::api::ApiRequest;
use elapi::config::{ConfigError, parse_override};
use elapi::output::Format;
use elapi::plugins::bill_teams::{BillingError, Period};

/// Command-line client for the eLabFTW REST API.
#[derive(Parser, Debug)]
#[command(name = "elapi", version = elapi::constants::VERSION)]
pub struct Cli {
    /// Override configuration for this run, as a YAML mapping
    /// (e.g. `-O 'timeout: 10'`). May be repeated.
    #[arg(short = 'O', long = "override", global = true)]
    pub overrides: Vec<String>,

    /// Log at debug level.
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse every `--override` in order.
    pub fn override_mappings(&self) -> Result<Vec<Mapping>, ConfigError> {
        self.overrides.iter().map(|raw| parse_override(raw)).collect()
    }
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Make a GET request.
    Get(GetArgs),

    /// Make a POST request.
    Post(WriteArgs),

    /// Make a PATCH request.
    Patch(WriteArgs),

    /// Make a DELETE request.
    Delete(DeleteArgs),

    /// Show the resolved configuration and where each value came from.
    ShowConfig(ShowConfigArgs),

    /// Remove the temporary data directory (deprecated).
    Cleanup,

    /// Gather team information and generate monthly bills.
    BillTeams {
        #[command(subcommand)]
        action: BillTeamsAction,
    },
}

/// Endpoint addressing shared by every request command.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Endpoint name, e.g. `experiments` or `users`.
    pub endpoint: String,

    /// Resource id.
    #[arg(short = 'i', long)]
    pub id: Option<String>,

    /// Sub-endpoint, e.g. `comments`. Needs `--id`.
    #[arg(long)]
    pub sub: Option<String>,

    /// Sub-endpoint resource id.
    #[arg(long, requires = "sub")]
    pub sub_id: Option<String>,
}

impl TargetArgs {
    pub fn request(&self) -> ApiRequest {
        let mut request = ApiRequest::new(self.endpoint.trim());
        if let Some(id) = &self.id {
            request = request.with_id(id);
        }
        if let Some(sub) = &self.sub {
            request = request.with_sub(sub, self.sub_id.clone());
        }
        request
    }

    /// File name stub for exports, e.g. `experiments_12_comments`.
    pub fn stub(&self) -> String {
        [Some(&self.endpoint), self.id.as_ref(), self.sub.as_ref(), self.sub_id.as_ref()]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// How command output is rendered and where it goes.
#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format: json, yaml (yml), csv or txt.
    #[arg(short = 'F', long, default_value = "json", value_parser = Format::from_str)]
    pub format: Format,

    /// Colour the output when stdout is a terminal.
    #[arg(short = 'H', long, default_value_t = false)]
    pub highlight: bool,

    /// Write to a file instead of stdout. Takes a directory or a file path;
    /// without a value the configured export directory is used.
    #[arg(short = 'e', long, num_args = 0..=1)]
    pub export: Option<Option<PathBuf>>,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Query parameter as `key=value`. May be repeated.
    #[arg(short = 'q', long = "query")]
    pub query: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl GetArgs {
    pub fn request(&self) -> Result<ApiRequest, String> {
        let mut request = self.target.request();
        for raw in &self.query {
            let (key, value) = parse_query(raw)?;
            request = request.with_query(key, value);
        }
        Ok(request)
    }
}

#[derive(Parser, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Request body as JSON or YAML.
    #[arg(short = 'd', long)]
    pub data: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct ShowConfigArgs {
    /// Render as json, yaml, csv or txt instead of a table.
    #[arg(short = 'F', long, value_parser = Format::from_str)]
    pub format: Option<Format>,
}

/// Billing month. Each part defaults to the current month.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct PeriodArgs {
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,
}

impl PeriodArgs {
    pub fn resolve(self) -> Result<Period, BillingError> {
        Period::resolve(self.year, self.month)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum BillTeamsAction {
    /// Fetch team information (members, owners, trial status).
    TeamsInfo {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show the configured owner information.
    OwnersInfo {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fetch team information and store it with the owner information
    /// for the period.
    StoreInfo {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Bill every included team and print the bill table.
    GenerateTable {
        #[command(flatten)]
        period: PeriodArgs,
        /// Compute the table without updating the registry.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Inspect or change billing decisions.
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum RegistryAction {
    /// Put a team into the next generated table.
    Include {
        team_id: u64,
        /// Change a team that was already billed this period.
        #[arg(long, default_value_t = false)]
        force: bool,
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Keep a team out of the next generated table.
    Exempt {
        team_id: u64,
        /// Change a team that was already billed this period.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Record the team as billed outside of elapi.
        #[arg(long, default_value_t = false)]
        mark_billed: bool,
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// List every team and its billing state.
    Show {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// `key=value`; the value may be empty.
pub fn parse_query(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid query {raw:?}: expected key=value")),
    }
}

/// Request body given as JSON or YAML. Must be a mapping or a list.
pub fn parse_data(raw: &str) -> Result<serde_json::Value, String> {
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => value,
        Err(_) => serde_yaml_ng::from_str::<serde_json::Value>(raw)
            .map_err(|e| format!("invalid --data: not JSON or YAML ({e})"))?,
    };
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(format!("invalid --data {raw:?}: expected a mapping or a list"))
    }
}
