//! Injectable environment.
//!
//! Configuration discovery reads `HOME`, the `XDG_*` directories and the
//! `ELAPI_*` overrides through [`Env`], so tests can hand in a fixed map
//! instead of mutating the process environment.

use std::collections::HashMap;
use std::path::PathBuf;

/// Either the process environment or a fixed map.
#[derive(Clone, Debug)]
pub struct Env {
    fixed: Option<HashMap<String, String>>,
}

impl Env {
    pub fn real() -> Self {
        Self { fixed: None }
    }

    /// An environment holding exactly `vars`.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            fixed: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.fixed {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// Look up a variable, treating empty values as unset.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Returns `true` when backed by the process environment.
    pub fn is_real(&self) -> bool {
        self.fixed.is_none()
    }

    /// All variables, sorted by name so prefix scans are deterministic.
    pub fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = match &self.fixed {
            Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => std::env::vars().collect(),
        };
        vars.sort();
        vars
    }

    /// The user's home directory. `HOME` wins over the platform lookup.
    pub fn home_dir(&self) -> Option<PathBuf> {
        match self.non_empty(crate::constants::ENV_HOME) {
            Some(home) => Some(PathBuf::from(home)),
            None if self.fixed.is_some() => None,
            None => dirs::home_dir(),
        }
    }
}
