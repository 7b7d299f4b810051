//! Per-period billing registry.
//!
//! One `registry.json` per billing month records, for every team, whether
//! it goes into the next generated table and how often it was billed.
//!
//! | state     | include | counter | last_updated |
//! |-----------|---------|---------|--------------|
//! | Undecided | false   | 0       | none         |
//! | Included  | true    | any     | any          |
//! | Billed    | false   | > 0     | set          |
//! | Exempted  | false   | 0       | set          |

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::export::write_atomic;
use crate::plugins::bill_teams::config::Period;
use crate::plugins::bill_teams::info::{TeamInfo, TeamOwner};
use crate::plugins::bill_teams::owners::{OwnerInfo, OwnersInfo};
use crate::plugins::bill_teams::table::BillRow;

pub const REGISTRY_FILENAME: &str = "registry.json";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("registry {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write registry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("team {team_id} is not in the registry for this period")]
    UnknownTeam { team_id: u64 },

    #[error("team {team_id} was already billed {billing_counter} time(s) this period; use --force to change it anyway")]
    AlreadyBilled { team_id: u64, billing_counter: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillGenerationMetadata {
    pub include_in_output_table: bool,
    pub billing_counter: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryState {
    Undecided,
    Included,
    Billed,
    Exempted,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryState::Undecided => "undecided",
            RegistryState::Included => "included",
            RegistryState::Billed => "billed",
            RegistryState::Exempted => "exempted",
        };
        f.write_str(name)
    }
}

impl BillGenerationMetadata {
    pub fn state(&self) -> RegistryState {
        if self.include_in_output_table {
            RegistryState::Included
        } else if self.billing_counter > 0 {
            RegistryState::Billed
        } else if self.last_updated.is_none() {
            RegistryState::Undecided
        } else {
            RegistryState::Exempted
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub team_name: String,
    #[serde(default)]
    pub active_members: u64,
    #[serde(default)]
    pub on_trial: bool,
    #[serde(default)]
    pub owners: Vec<TeamOwner>,
    #[serde(default)]
    pub owner_info: Option<OwnerInfo>,
    #[serde(default)]
    pub bill_generation_metadata: BillGenerationMetadata,
}

impl RegistryEntry {
    pub fn state(&self) -> RegistryState {
        self.bill_generation_metadata.state()
    }
}

/// The registry file for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    path: PathBuf,
    entries: IndexMap<u64, RegistryEntry>,
}

impl Registry {
    pub fn path_for(root: &Path, period: Period) -> PathBuf {
        period.dir(root).join(REGISTRY_FILENAME)
    }

    /// Load the registry; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            IndexMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, team_id: u64) -> Option<&RegistryEntry> {
        self.entries.get(&team_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, &RegistryEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One summary object per team, for display.
    pub fn overview(&self) -> serde_json::Value {
        self.entries
            .iter()
            .map(|(team_id, entry)| {
                let meta = &entry.bill_generation_metadata;
                serde_json::json!({
                    "team_id": team_id,
                    "team_name": entry.team_name,
                    "state": entry.state().to_string(),
                    "active_members": entry.active_members,
                    "on_trial": entry.on_trial,
                    "include_in_output_table": meta.include_in_output_table,
                    "billing_counter": meta.billing_counter,
                    "last_updated": meta.last_updated.map(|t| t.to_rfc3339()),
                })
            })
            .collect()
    }

    /// Add unseen teams as undecided and refresh the metadata of known
    /// ones. Billing decisions are never touched.
    pub fn sync(&mut self, teams: &[TeamInfo], owners: &OwnersInfo) {
        for team in teams {
            let owner_info = owners.get(team.team_id).cloned();
            match self.entries.get_mut(&team.team_id) {
                Some(entry) => {
                    entry.team_name = team.team_name.clone();
                    entry.active_members = team.active_members;
                    entry.on_trial = team.on_trial;
                    entry.owners = team.owners.clone();
                    entry.owner_info = owner_info;
                }
                None => {
                    tracing::debug!(team_id = team.team_id, "new team in registry");
                    self.entries.insert(
                        team.team_id,
                        RegistryEntry {
                            team_name: team.team_name.clone(),
                            active_members: team.active_members,
                            on_trial: team.on_trial,
                            owners: team.owners.clone(),
                            owner_info,
                            bill_generation_metadata: BillGenerationMetadata::default(),
                        },
                    );
                }
            }
        }
        self.entries.sort_keys();
    }

    fn entry_for_change(
        &mut self,
        team_id: u64,
        force: bool,
    ) -> Result<&mut RegistryEntry, RegistryError> {
        let entry = self
            .entries
            .get_mut(&team_id)
            .ok_or(RegistryError::UnknownTeam { team_id })?;
        let billing_counter = entry.bill_generation_metadata.billing_counter;
        if billing_counter > 0 && !force {
            return Err(RegistryError::AlreadyBilled {
                team_id,
                billing_counter,
            });
        }
        Ok(entry)
    }

    /// Put a team into the next generated table.
    pub fn include(
        &mut self,
        team_id: u64,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RegistryState, RegistryError> {
        let entry = self.entry_for_change(team_id, force)?;
        let meta = &mut entry.bill_generation_metadata;
        if !meta.include_in_output_table {
            meta.include_in_output_table = true;
            meta.last_updated = Some(now);
        }
        Ok(meta.state())
    }

    /// Keep a team out of the next generated table. With `mark_billed`
    /// the team is recorded as billed outside of this tool.
    pub fn exempt(
        &mut self,
        team_id: u64,
        force: bool,
        mark_billed: bool,
        now: DateTime<Utc>,
    ) -> Result<RegistryState, RegistryError> {
        let entry = self.entry_for_change(team_id, force)?;
        let meta = &mut entry.bill_generation_metadata;
        meta.include_in_output_table = false;
        if mark_billed {
            meta.billing_counter = meta.billing_counter.saturating_add(1);
        }
        meta.last_updated = Some(now);
        Ok(meta.state())
    }

    /// Promote undecided teams, then bill every included, non-trial team
    /// whose bill is above zero.
    pub fn generate(
        &mut self,
        unit_price: f64,
        currency: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> Vec<BillRow> {
        let mut rows = Vec::new();
        for (team_id, entry) in &mut self.entries {
            let meta = &mut entry.bill_generation_metadata;
            if meta.state() == RegistryState::Undecided {
                meta.include_in_output_table = true;
            }
            if !meta.include_in_output_table {
                continue;
            }
            if entry.on_trial {
                tracing::info!(team_id, team = %entry.team_name, "team is on trial, not billed");
                continue;
            }

            let total = entry.active_members as f64 * unit_price;
            if total <= 0.0 {
                tracing::info!(team_id, team = %entry.team_name, "bill is zero, not billed");
                continue;
            }

            let meta = &mut entry.bill_generation_metadata;
            meta.billing_counter = meta.billing_counter.saturating_add(1);
            meta.include_in_output_table = false;
            meta.last_updated = Some(now);
            rows.push(BillRow::new(*team_id, entry, unit_price, total, currency, period));
        }
        rows
    }
}
