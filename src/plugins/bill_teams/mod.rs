//! Team billing.
//!
//! Gathers team and owner information from the API, stores a snapshot per
//! billing month and keeps a registry of which teams were billed. The
//! registry guarantees a team is billed at most once per month unless an
//! operator forces it.

pub mod config;
pub mod info;
pub mod owners;
pub mod registry;
pub mod store;
pub mod table;

use std::path::PathBuf;

use serde_yaml_ng::Mapping;
use thiserror::Error;

use crate::api::ApiError;
use crate::env::Env;
use crate::error::{PathValidationError, ValidationError};
use crate::plugins::CommandPlugin;

pub use config::{BillTeamsConfig, Period};
pub use registry::{Registry, RegistryError, RegistryState};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("invalid billing period {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("invalid owners info file {path}: {reason}")]
    Owners { path: PathBuf, reason: String },

    #[error("owners info file is not configured; set plugin.bill_teams.owners_info_path")]
    OwnersNotConfigured,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Path(#[from] PathValidationError),
}

impl From<BillingError> for ValidationError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Api(api) => api.into(),
            BillingError::Path(path) => path.into(),
            BillingError::Registry(RegistryError::AlreadyBilled { .. }) => {
                ValidationError::critical(err.to_string())
                    .with_note("Check the registry with `elapi bill-teams registry show`.")
            }
            BillingError::OwnersNotConfigured => ValidationError::critical(err.to_string())
                .with_note("Point owners_info_path at a YAML or JSON file keyed by team id."),
            other => ValidationError::critical(other.to_string()),
        }
    }
}

/// The `bill-teams` command.
pub struct BillTeams;

impl CommandPlugin for BillTeams {
    fn name(&self) -> &'static str {
        "bill_teams"
    }

    fn about(&self) -> &'static str {
        "Gather team information and generate monthly bills"
    }

    fn validate_config(&self, section: &Mapping) -> Vec<String> {
        BillTeamsConfig::from_mapping(section, &Env::real()).1
    }
}
