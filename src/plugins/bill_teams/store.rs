//! Per-period snapshot files under the billing root.

use std::path::{Path, PathBuf};

use crate::output::export::write_atomic;
use crate::path_validator::PathValidator;
use crate::plugins::bill_teams::BillingError;
use crate::plugins::bill_teams::config::Period;
use crate::plugins::bill_teams::info::TeamInfo;
use crate::plugins::bill_teams::owners::OwnersInfo;
use crate::plugins::bill_teams::registry::Registry;

pub const TEAMS_INFO_FILENAME: &str = "teams_info.json";
pub const OWNERS_INFO_FILENAME: &str = "owners_info.json";

/// Write both snapshots for the period and sync the registry with them.
/// Returns the period directory.
pub fn store_info(
    root: &Path,
    period: Period,
    teams: &[TeamInfo],
    owners: &OwnersInfo,
) -> Result<PathBuf, BillingError> {
    let dir = PathValidator::new([period.dir(root)]).directories().validate()?;

    write_json(&dir.join(TEAMS_INFO_FILENAME), &serde_json::to_string_pretty(teams)?)?;
    write_json(&dir.join(OWNERS_INFO_FILENAME), &serde_json::to_string_pretty(owners)?)?;

    let mut registry = Registry::load(&Registry::path_for(root, period))?;
    registry.sync(teams, owners);
    registry.save()?;
    tracing::info!(dir = %dir.display(), teams = teams.len(), "stored billing info for {period}");
    Ok(dir)
}

/// Snapshots stored earlier for the period, if both exist.
pub fn load_stored(
    root: &Path,
    period: Period,
) -> Result<Option<(Vec<TeamInfo>, OwnersInfo)>, BillingError> {
    let dir = period.dir(root);
    let teams_path = dir.join(TEAMS_INFO_FILENAME);
    let owners_path = dir.join(OWNERS_INFO_FILENAME);
    if !teams_path.is_file() || !owners_path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&teams_path).map_err(|source| BillingError::Io {
        path: teams_path.clone(),
        source,
    })?;
    let teams = serde_json::from_str(&content)?;
    let owners = OwnersInfo::load(&owners_path)?;
    Ok(Some((teams, owners)))
}

fn write_json(path: &Path, json: &str) -> Result<(), BillingError> {
    write_atomic(path, json.as_bytes()).map_err(|source| BillingError::Io {
        path: path.to_path_buf(),
        source,
    })
}
