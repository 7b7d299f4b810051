//! Owner (billing contact) information, maintained by hand in a YAML or
//! JSON file keyed by team id.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

use crate::plugins::bill_teams::BillingError;
use crate::plugins::bill_teams::info::TeamInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub owner_name: String,
    pub owner_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    /// Any further columns the file carries.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Owner info per team id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnersInfo {
    owners: IndexMap<String, OwnerInfo>,
}

impl OwnersInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, BillingError> {
        let invalid = |reason: String| BillingError::Owners {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let root: Value = serde_yaml_ng::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let mapping = match root {
            Value::Null => return Ok(Self::new()),
            Value::Mapping(m) => m,
            _ => return Err(invalid("expected a mapping of team id to owner info".into())),
        };

        let mut owners = IndexMap::new();
        for (key, value) in mapping {
            let team_id = match key {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_string(),
                other => return Err(invalid(format!("team id {other:?} is not a number"))),
            };
            let info = normalize_scalars(value);
            let info: OwnerInfo = serde_yaml_ng::from_value(info)
                .map_err(|e| invalid(format!("team {team_id}: {e}")))?;
            owners.insert(team_id, info);
        }
        Ok(Self { owners })
    }

    pub fn insert(&mut self, team_id: u64, info: OwnerInfo) {
        self.owners.insert(team_id.to_string(), info);
    }

    pub fn get(&self, team_id: u64) -> Option<&OwnerInfo> {
        self.owners.get(&team_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Teams without an owner entry, each logged as a warning.
    pub fn missing_for<'a>(&self, teams: &'a [TeamInfo]) -> Vec<&'a TeamInfo> {
        let missing: Vec<&TeamInfo> = teams
            .iter()
            .filter(|t| self.get(t.team_id).is_none())
            .collect();
        for team in &missing {
            tracing::warn!(team_id = team.team_id, team = %team.team_name, "no owner info for team");
        }
        missing
    }

    /// Owner info as a JSON object keyed by team id.
    pub fn to_json(&self) -> Result<serde_json::Value, BillingError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Cost centers are often written as bare numbers; keep them as strings.
fn normalize_scalars(value: Value) -> Value {
    match value {
        Value::Mapping(m) => Value::Mapping(
            m.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::Number(n) => Value::String(n.to_string()),
                        other => other,
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}
