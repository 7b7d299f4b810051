//! elapi: command-line client for the eLabFTW REST API.
//!
//! Entry point and error handling boundary. Uses `anyhow` for error
//! propagation and user-facing messages.

mod cli;

use std::process;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;

use elapi::api::{self, ClientSettings, blocking};
use elapi::config::paths::app_data_dir;
use elapi::config::{ConfigContext, Settings};
use elapi::constants::MAX_CONNECTIONS;
use elapi::env::Env;
use elapi::error::ValidationError;
use elapi::logging::{LogConfig, init_logging};
use elapi::output;
use elapi::plugins::bill_teams::info::{TeamInfo, fetch_teams_info};
use elapi::plugins::bill_teams::owners::OwnersInfo;
use elapi::plugins::bill_teams::{BillTeamsConfig, BillingError, Period, Registry, store, table};
use elapi::retry::{MAX_ATTEMPTS, with_backoff};

use cli::args::{
    BillTeamsAction, Cli, Command, DeleteArgs, GetArgs, OutputArgs, RegistryAction,
    ShowConfigArgs, WriteArgs, parse_data,
};

fn main() {
    let cli = Cli::parse();
    let env = Env::real();
    init_logging(&LogConfig::from_env(&env, cli.debug));

    let mut ctx = match load_context(&cli, env) {
        Ok(ctx) => ctx,
        Err(err) => {
            report_error(&err, false);
            process::exit(1);
        }
    };
    let development_mode = ctx.development_mode();

    if let Err(err) = run(cli.command, &mut ctx) {
        report_error(&err, development_mode);
        process::exit(1);
    }
}

fn load_context(cli: &Cli, env: Env) -> Result<ConfigContext> {
    let overrides = cli.override_mappings()?;
    let cwd = std::env::current_dir().context("failed to determine the current directory")?;
    let ctx = ConfigContext::load(env, &cwd, &overrides).map_err(ValidationError::from)?;
    Ok(ctx)
}

/// Print the error and, for validation failures, the hint attached to it.
fn report_error(err: &anyhow::Error, development_mode: bool) {
    if development_mode {
        eprintln!("Error: {err:?}");
    } else {
        eprintln!("Error: {err:#}");
    }
    let note = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ValidationError>())
        .and_then(ValidationError::note);
    if let Some(note) = note {
        eprintln!("{} {note}", "Note:".yellow().bold());
    }
}

fn run(command: Command, ctx: &mut ConfigContext) -> Result<()> {
    match command {
        Command::Get(args) => run_get(args, ctx),
        Command::Post(args) => run_post(args, ctx),
        Command::Patch(args) => run_patch(args, ctx),
        Command::Delete(args) => run_delete(args, ctx),
        Command::ShowConfig(args) => run_show_config(args, ctx),
        Command::Cleanup => run_cleanup(ctx),
        Command::BillTeams { action } => run_bill_teams(action, ctx),
    }
}

// ── API requests ────────────────────────────────────────────────────

/// Validate settings and build a client. Fails before any request is sent.
fn blocking_client(ctx: &mut ConfigContext) -> Result<(Settings, blocking::Client)> {
    let settings = ctx.settings()?;
    let client = blocking::Client::new(ClientSettings::from(&settings))?;
    Ok((settings, client))
}

fn emit_body(body: &str, output: &OutputArgs, stub: &str, settings: &Settings) -> Result<()> {
    let rendered = output::format_body(body, output.format)?;
    cli::emit(&rendered, output, stub, || Ok(settings.export_dir.clone()))
}

fn run_get(args: GetArgs, ctx: &mut ConfigContext) -> Result<()> {
    let request = args.request().map_err(anyhow::Error::msg)?;
    request.validate()?;
    let (settings, client) = blocking_client(ctx)?;

    let response = client.get(&request)?;
    emit_body(&response.body, &args.output, &args.target.stub(), &settings)
}

fn run_post(args: WriteArgs, ctx: &mut ConfigContext) -> Result<()> {
    let data = parse_data(&args.data).map_err(anyhow::Error::msg)?;
    let request = args.target.request();
    request.validate()?;
    let (settings, client) = blocking_client(ctx)?;

    let response = client.post(&request, &data)?;
    match response.created_id() {
        Some(id) => tracing::info!(endpoint = %request.endpoint, id, "created"),
        None => tracing::info!(endpoint = %request.endpoint, status = response.status, "done"),
    }
    emit_body(&response.body, &args.output, &args.target.stub(), &settings)
}

fn run_patch(args: WriteArgs, ctx: &mut ConfigContext) -> Result<()> {
    let data = parse_data(&args.data).map_err(anyhow::Error::msg)?;
    let request = args.target.request();
    request.validate()?;
    let (settings, client) = blocking_client(ctx)?;

    let response = client.patch(&request, &data)?;
    emit_body(&response.body, &args.output, &args.target.stub(), &settings)
}

fn run_delete(args: DeleteArgs, ctx: &mut ConfigContext) -> Result<()> {
    let request = args.target.request();
    request.validate()?;
    let (settings, client) = blocking_client(ctx)?;

    let response = client.delete(&request)?;
    tracing::info!(endpoint = %request.endpoint, status = response.status, "deleted");
    emit_body(&response.body, &args.output, &args.target.stub(), &settings)
}

// ── Local commands ──────────────────────────────────────────────────

fn run_show_config(args: ShowConfigArgs, ctx: &mut ConfigContext) -> Result<()> {
    // host and token are not required here
    ctx.resolve_defaults()?;

    match args.format {
        Some(format) => {
            let rendered = output::format_value(&cli::config_rows(ctx), format)?;
            cli::print_rendered(&rendered, format, false);
        }
        None => print!("{}", cli::config_table(ctx)),
    }
    Ok(())
}

fn run_cleanup(ctx: &ConfigContext) -> Result<()> {
    tracing::warn!("`cleanup` is deprecated and will be removed in a future release");
    let Some(dir) = app_data_dir(&ctx.env).map(|d| d.join("tmp")) else {
        bail!("cannot determine the application data directory; set HOME or XDG_DATA_HOME");
    };
    let removed = cli::remove_dir_if_exists(&dir)
        .with_context(|| format!("failed to remove {}", dir.display()))?;
    if removed {
        println!("Removed {}", dir.display());
    } else {
        println!("Nothing to clean up.");
    }
    Ok(())
}

// ── bill-teams ──────────────────────────────────────────────────────

/// Billing results as validation errors, so the boundary can print notes.
fn billing<T, E: Into<BillingError>>(result: Result<T, E>) -> Result<T, ValidationError> {
    result.map_err(|err| ValidationError::from(err.into()))
}

fn run_bill_teams(action: BillTeamsAction, ctx: &mut ConfigContext) -> Result<()> {
    let section = ctx.plugin("bill_teams")?;
    let (config, _) = BillTeamsConfig::from_mapping(&section, &ctx.env);
    tracing::debug!(root = %config.root_directory.display(), "bill-teams root directory");

    match action {
        BillTeamsAction::TeamsInfo { period, output } => {
            let period = billing(period.resolve())?;
            let Some(teams) = fetch_teams(&config, period, ctx)? else {
                return Ok(());
            };
            let rendered = output::format_value(&serde_json::to_value(&teams)?, output.format)?;
            cli::emit(&rendered, &output, &format!("teams_info_{period}"), || {
                ctx.export_dir()
            })
        }
        BillTeamsAction::OwnersInfo { output } => {
            let path = billing(
                config
                    .owners_info_path
                    .as_deref()
                    .ok_or(BillingError::OwnersNotConfigured),
            )?;
            let owners = billing(OwnersInfo::load(path))?;
            let rendered = output::format_value(&billing(owners.to_json())?, output.format)?;
            cli::emit(&rendered, &output, "owners_info", || ctx.export_dir())
        }
        BillTeamsAction::StoreInfo { period } => {
            let period = billing(period.resolve())?;
            run_store_info(&config, period, ctx)
        }
        BillTeamsAction::GenerateTable {
            period,
            dry_run,
            output,
        } => {
            let period = billing(period.resolve())?;
            run_generate_table(&config, period, dry_run, &output, ctx)
        }
        BillTeamsAction::Registry { action } => run_registry(&config, action, ctx),
    }
}

/// Fetch team information, retrying transient failures. Returns `None`
/// when every attempt failed transiently; that is logged, not raised.
fn fetch_teams(
    config: &BillTeamsConfig,
    period: Period,
    ctx: &mut ConfigContext,
) -> Result<Option<Vec<TeamInfo>>> {
    let settings = ctx.settings()?;
    let client = api::Client::new(ClientSettings::from(&settings))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let client = &client;
    let trial_days = config.trial_days;
    let result = runtime.block_on(with_backoff(
        MAX_ATTEMPTS,
        config.retry_backoff,
        move |attempt| async move {
            if attempt > 0 {
                tracing::info!(attempt = attempt + 1, "fetching team information again");
            }
            fetch_teams_info(client, period, trial_days, MAX_CONNECTIONS)
                .await
                .map_err(ValidationError::from)
        },
    ));

    match result {
        Ok(teams) => Ok(Some(teams)),
        Err(err) if err.is_retryable() => {
            tracing::error!(attempts = MAX_ATTEMPTS, "giving up on team information: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn load_owners(config: &BillTeamsConfig) -> Result<OwnersInfo> {
    match &config.owners_info_path {
        Some(path) => Ok(billing(OwnersInfo::load(path))?),
        None => {
            tracing::warn!("owners_info_path is not set; bills will name the team owners from eLabFTW");
            Ok(OwnersInfo::new())
        }
    }
}

fn run_store_info(config: &BillTeamsConfig, period: Period, ctx: &mut ConfigContext) -> Result<()> {
    let owners = load_owners(config)?;
    let Some(teams) = fetch_teams(config, period, ctx)? else {
        return Ok(());
    };
    owners.missing_for(&teams);
    let dir = billing(store::store_info(&config.root_directory, period, &teams, &owners))?;
    println!("{}", dir.display());
    Ok(())
}

fn run_generate_table(
    config: &BillTeamsConfig,
    period: Period,
    dry_run: bool,
    output: &OutputArgs,
    ctx: &mut ConfigContext,
) -> Result<()> {
    let (teams, owners) = match billing(store::load_stored(&config.root_directory, period))? {
        Some(stored) => {
            tracing::info!("using team information stored for {period}");
            stored
        }
        None => {
            let owners = load_owners(config)?;
            let Some(teams) = fetch_teams(config, period, ctx)? else {
                return Ok(());
            };
            billing(store::store_info(&config.root_directory, period, &teams, &owners))?;
            (teams, owners)
        }
    };
    owners.missing_for(&teams);

    let mut registry = billing(Registry::load(&Registry::path_for(&config.root_directory, period)))?;
    registry.sync(&teams, &owners);
    billing(registry.save())?;

    let rows = if dry_run {
        tracing::info!("dry run; billing decisions left unchanged");
        registry
            .clone()
            .generate(config.unit_price, &config.currency, period, Utc::now())
    } else {
        let rows = registry.generate(config.unit_price, &config.currency, period, Utc::now());
        billing(registry.save())?;
        rows
    };

    if rows.is_empty() {
        tracing::info!("no teams left to bill for {period}");
    } else {
        tracing::info!(
            teams = rows.len(),
            total = table::grand_total(&rows),
            currency = %config.currency,
            "generated bills for {period}"
        );
    }
    let rendered = output::format_value(&table::rows_to_value(&rows)?, output.format)?;
    cli::emit(&rendered, output, &format!("bills_{period}"), || ctx.export_dir())
}

fn run_registry(
    config: &BillTeamsConfig,
    action: RegistryAction,
    ctx: &mut ConfigContext,
) -> Result<()> {
    match action {
        RegistryAction::Include {
            team_id,
            force,
            period,
        } => {
            let period = billing(period.resolve())?;
            let mut registry = load_registry(config, period)?;
            let state = billing(registry.include(team_id, force, Utc::now()))?;
            billing(registry.save())?;
            println!("team {team_id}: {state}");
            Ok(())
        }
        RegistryAction::Exempt {
            team_id,
            force,
            mark_billed,
            period,
        } => {
            let period = billing(period.resolve())?;
            let mut registry = load_registry(config, period)?;
            let state = billing(registry.exempt(team_id, force, mark_billed, Utc::now()))?;
            billing(registry.save())?;
            println!("team {team_id}: {state}");
            Ok(())
        }
        RegistryAction::Show { period, output } => {
            let period = billing(period.resolve())?;
            let registry = load_registry(config, period)?;
            if registry.is_empty() {
                tracing::warn!(
                    path = %registry.path().display(),
                    "registry is empty; run `elapi bill-teams store-info` first"
                );
            }
            let rendered = output::format_value(&registry.overview(), output.format)?;
            cli::emit(&rendered, &output, &format!("registry_{period}"), || {
                ctx.export_dir()
            })
        }
    }
}

fn load_registry(config: &BillTeamsConfig, period: Period) -> Result<Registry> {
    Ok(billing(Registry::load(&Registry::path_for(
        &config.root_directory,
        period,
    )))?)
}
