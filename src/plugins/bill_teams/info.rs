//! Team information gathered from the API.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::{ApiRequest, Client, fan_out_get};
use crate::plugins::bill_teams::BillingError;
use crate::plugins::bill_teams::config::Period;

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A team as listed by `GET teams`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiTeam {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A user as listed by `GET users`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiUserSummary {
    pub userid: u64,
}

/// A user's team membership from `GET users/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMembership {
    pub id: u64,
    #[serde(default, deserialize_with = "flag")]
    pub is_owner: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_archived: bool,
}

/// A user as returned by `GET users/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiUser {
    pub userid: u64,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub teams: Vec<ApiMembership>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamOwner {
    pub userid: u64,
    pub fullname: String,
    pub email: String,
}

/// Everything billing needs to know about one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub team_id: u64,
    pub team_name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub active_members: u64,
    #[serde(default)]
    pub owners: Vec<TeamOwner>,
    #[serde(default)]
    pub on_trial: bool,
}

/// eLabFTW reports booleans as `0`/`1` in some versions.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        Some(Flag::Str(s)) => matches!(s.as_str(), "1" | "true"),
    })
}

fn is_on_trial(created_at: Option<&str>, period: Period, trial_days: u32) -> bool {
    let Some(raw) = created_at else {
        return false;
    };
    match NaiveDateTime::parse_from_str(raw, CREATED_AT_FORMAT) {
        Ok(created) => created >= period.trial_cutoff(trial_days),
        Err(err) => {
            tracing::warn!(created_at = raw, error = %err, "unparseable team creation date; treating team as billable");
            false
        }
    }
}

/// Combine the team list with per-user details.
pub fn build_teams_info(
    teams: &[ApiTeam],
    users: &[ApiUser],
    period: Period,
    trial_days: u32,
) -> Vec<TeamInfo> {
    let mut infos: IndexMap<u64, TeamInfo> = teams
        .iter()
        .map(|team| {
            let info = TeamInfo {
                team_id: team.id,
                team_name: team.name.clone(),
                created_at: team.created_at.clone(),
                active_members: 0,
                owners: Vec::new(),
                on_trial: is_on_trial(team.created_at.as_deref(), period, trial_days),
            };
            (team.id, info)
        })
        .collect();

    for user in users {
        for membership in &user.teams {
            let Some(info) = infos.get_mut(&membership.id) else {
                tracing::debug!(team = membership.id, user = user.userid, "membership in unlisted team");
                continue;
            };
            if membership.is_archived {
                continue;
            }
            info.active_members += 1;
            if membership.is_owner {
                info.owners.push(TeamOwner {
                    userid: user.userid,
                    fullname: user.fullname.clone(),
                    email: user.email.clone(),
                });
            }
        }
    }

    let mut infos: Vec<TeamInfo> = infos.into_values().collect();
    infos.sort_by_key(|t| t.team_id);
    for info in &mut infos {
        info.owners.sort_by_key(|o| o.userid);
    }
    infos
}

/// Fetch teams and users, then every user's details concurrently.
pub async fn fetch_teams_info(
    client: &Client,
    period: Period,
    trial_days: u32,
    limit: usize,
) -> Result<Vec<TeamInfo>, BillingError> {
    let teams: Vec<ApiTeam> = client.get(&ApiRequest::new("teams")).await?.json_as()?;
    let summaries: Vec<ApiUserSummary> = client.get(&ApiRequest::new("users")).await?.json_as()?;
    tracing::info!(teams = teams.len(), users = summaries.len(), "fetching user details");

    let requests = summaries
        .iter()
        .map(|u| ApiRequest::new("users").with_id(u.userid))
        .collect();
    let users = fan_out_get(client, requests, limit)
        .await?
        .into_iter()
        .map(|(_, response)| response.json_as::<ApiUser>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(build_teams_info(&teams, &users, period, trial_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn teams() -> Vec<ApiTeam> {
        serde_json::from_value(json!([
            {"id": 1, "name": "Alpha", "created_at": "2020-01-01 10:00:00"},
            {"id": 2, "name": "Beta", "created_at": "2024-03-25 09:00:00"},
            {"id": 3, "name": "Empty"},
        ]))
        .unwrap()
    }

    fn users() -> Vec<ApiUser> {
        serde_json::from_value(json!([
            {"userid": 10, "fullname": "Ada Owner", "email": "ada@x.org",
             "teams": [{"id": 1, "is_owner": 1, "is_archived": 0}, {"id": 2, "is_owner": true}]},
            {"userid": 11, "fullname": "Bob", "email": "bob@x.org",
             "teams": [{"id": 1, "is_owner": 0, "is_archived": 0}]},
            {"userid": 12, "fullname": "Cy Gone", "email": "cy@x.org",
             "teams": [{"id": 1, "is_owner": 1, "is_archived": 1}, {"id": 99}]},
        ]))
        .unwrap()
    }

    #[test]
    fn counts_active_members_and_owners() {
        let period = Period::new(2024, 3).unwrap();
        let infos = build_teams_info(&teams(), &users(), period, 0);
        assert_eq!(infos.len(), 3);

        let alpha = &infos[0];
        assert_eq!(alpha.team_name, "Alpha");
        assert_eq!(alpha.active_members, 2);
        assert_eq!(alpha.owners.len(), 1);
        assert_eq!(alpha.owners[0].email, "ada@x.org");
        assert!(!alpha.on_trial);

        assert_eq!(infos[1].active_members, 1);
        assert_eq!(infos[2].active_members, 0);
        assert!(infos[2].owners.is_empty());
    }

    #[test]
    fn recent_teams_are_on_trial() {
        let period = Period::new(2024, 3).unwrap();
        let infos = build_teams_info(&teams(), &users(), period, 30);
        assert!(!infos[0].on_trial);
        assert!(infos[1].on_trial);
        assert!(!infos[2].on_trial);
    }

    #[test]
    fn zero_trial_days_means_no_trial() {
        let period = Period::new(2024, 3).unwrap();
        let infos = build_teams_info(&teams(), &users(), period, 0);
        assert!(infos.iter().all(|t| !t.on_trial));
    }

    #[test]
    fn huge_trial_window_puts_every_dated_team_on_trial() {
        let period = Period::new(2024, 3).unwrap();
        let infos = build_teams_info(&teams(), &users(), period, 4_000_000_000);
        assert!(infos[0].on_trial);
        assert!(infos[1].on_trial);
        assert!(!infos[2].on_trial);
    }

    #[test]
    fn flags_accept_ints_bools_and_null() {
        let m: ApiMembership =
            serde_json::from_value(json!({"id": 1, "is_owner": null, "is_archived": "1"}))
                .unwrap();
        assert!(!m.is_owner);
        assert!(m.is_archived);
    }
}
