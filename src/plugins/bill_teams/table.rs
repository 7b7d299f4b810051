//! Generated bill rows.

use serde::Serialize;

use crate::plugins::bill_teams::config::Period;
use crate::plugins::bill_teams::registry::RegistryEntry;

/// One line of the bill table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillRow {
    pub team_id: u64,
    pub team_name: String,
    pub owner_name: String,
    pub owner_email: String,
    pub cost_center: String,
    pub institution: String,
    pub active_members: u64,
    pub unit_price: f64,
    pub total: f64,
    pub currency: String,
    pub period: String,
}

impl BillRow {
    pub fn new(
        team_id: u64,
        entry: &RegistryEntry,
        unit_price: f64,
        total: f64,
        currency: &str,
        period: Period,
    ) -> Self {
        // owner info file first, then the first team owner known to the API
        let (owner_name, owner_email, cost_center, institution) = match &entry.owner_info {
            Some(info) => (
                info.owner_name.clone(),
                info.owner_email.clone(),
                info.cost_center.clone().unwrap_or_default(),
                info.institution.clone().unwrap_or_default(),
            ),
            None => match entry.owners.first() {
                Some(owner) => (
                    owner.fullname.clone(),
                    owner.email.clone(),
                    String::new(),
                    String::new(),
                ),
                None => Default::default(),
            },
        };

        Self {
            team_id,
            team_name: entry.team_name.clone(),
            owner_name,
            owner_email,
            cost_center,
            institution,
            active_members: entry.active_members,
            unit_price,
            total,
            currency: currency.to_string(),
            period: period.to_string(),
        }
    }
}

/// Rows as a JSON array for the output renderers.
pub fn rows_to_value(rows: &[BillRow]) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(rows)
}

/// Sum of all row totals.
pub fn grand_total(rows: &[BillRow]) -> f64 {
    rows.iter().map(|r| r.total).sum()
}
