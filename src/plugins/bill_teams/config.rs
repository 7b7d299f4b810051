//! `plugin.bill_teams` configuration and billing periods.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde_yaml_ng::{Mapping, Value};

use crate::config::paths::{app_data_dir, expand_path};
use crate::env::Env;
use crate::retry::INITIAL_BACKOFF;
use crate::plugins::bill_teams::BillingError;

pub const DEFAULT_CURRENCY: &str = "EUR";

const KEY_ROOT_DIRECTORY: &str = "root_directory";
const KEY_OWNERS_INFO_PATH: &str = "owners_info_path";
const KEY_UNIT_PRICE: &str = "unit_price";
const KEY_TRIAL_DAYS: &str = "trial_days";
const KEY_CURRENCY: &str = "currency";
const KEY_RETRY_BACKOFF: &str = "retry_backoff";

const KNOWN_KEYS: &[&str] = &[
    KEY_ROOT_DIRECTORY,
    KEY_OWNERS_INFO_PATH,
    KEY_UNIT_PRICE,
    KEY_TRIAL_DAYS,
    KEY_CURRENCY,
    KEY_RETRY_BACKOFF,
];

#[derive(Debug, Clone, PartialEq)]
pub struct BillTeamsConfig {
    pub root_directory: PathBuf,
    pub owners_info_path: Option<PathBuf>,
    pub unit_price: f64,
    pub trial_days: u32,
    pub currency: String,
    /// First delay between attempts to fetch team information.
    pub retry_backoff: Duration,
}

impl BillTeamsConfig {
    /// Parse the section, falling back to defaults. Returns the config and
    /// one warning per problem found.
    pub fn from_mapping(section: &Mapping, env: &Env) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        for key in section.keys() {
            match key.as_str() {
                Some(k) if KNOWN_KEYS.contains(&k) => {}
                _ => warnings.push(format!("unknown bill_teams setting {key:?} is ignored")),
            }
        }

        let root_directory = match section.get(KEY_ROOT_DIRECTORY) {
            Some(Value::String(raw)) if !raw.trim().is_empty() => expand_path(raw, env),
            other => {
                if other.is_some_and(|v| !v.is_null()) {
                    warnings.push("root_directory must be a non-empty string".to_string());
                }
                default_root(env)
            }
        };

        let owners_info_path = match section.get(KEY_OWNERS_INFO_PATH) {
            Some(Value::String(raw)) if !raw.trim().is_empty() => Some(expand_path(raw, env)),
            None | Some(Value::Null) => None,
            Some(_) => {
                warnings.push("owners_info_path must be a string".to_string());
                None
            }
        };

        let unit_price = match section.get(KEY_UNIT_PRICE).and_then(Value::as_f64) {
            Some(price) if price.is_finite() && price >= 0.0 => price,
            Some(_) => {
                warnings.push("unit_price must not be negative; using 0".to_string());
                0.0
            }
            None => {
                warnings.push("unit_price is not set; every bill will be 0".to_string());
                0.0
            }
        };

        let trial_days = match section.get(KEY_TRIAL_DAYS) {
            None | Some(Value::Null) => 0,
            Some(v) => match v.as_u64().and_then(|d| u32::try_from(d).ok()) {
                Some(days) => days,
                None => {
                    warnings.push("trial_days must be a non-negative integer; using 0".to_string());
                    0
                }
            },
        };

        let currency = match section.get(KEY_CURRENCY) {
            Some(Value::String(c)) if !c.trim().is_empty() => c.trim().to_string(),
            None | Some(Value::Null) => DEFAULT_CURRENCY.to_string(),
            Some(_) => {
                warnings.push(format!("currency must be a string; using {DEFAULT_CURRENCY}"));
                DEFAULT_CURRENCY.to_string()
            }
        };

        let retry_backoff = match section.get(KEY_RETRY_BACKOFF) {
            None | Some(Value::Null) => INITIAL_BACKOFF,
            Some(v) => match v.as_f64().and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
                Some(backoff) => backoff,
                None => {
                    warnings.push(format!(
                        "retry_backoff must be a non-negative number of seconds; using {}",
                        INITIAL_BACKOFF.as_secs()
                    ));
                    INITIAL_BACKOFF
                }
            },
        };

        (
            Self {
                root_directory,
                owners_info_path,
                unit_price,
                trial_days,
                currency,
                retry_backoff,
            },
            warnings,
        )
    }

    pub fn period_dir(&self, period: Period) -> PathBuf {
        period.dir(&self.root_directory)
    }
}

fn default_root(env: &Env) -> PathBuf {
    app_data_dir(env)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bill_teams")
}

/// A billing month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(BillingError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// Resolve `--year/--month`, defaulting each to the current month.
    pub fn resolve(year: Option<i32>, month: Option<u32>) -> Result<Self, BillingError> {
        let current = Self::current();
        Self::new(year.unwrap_or(current.year), month.unwrap_or(current.month))
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// First instant after the period.
    pub fn end(self) -> NaiveDateTime {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .unwrap_or(NaiveDate::MAX)
            .and_time(chrono::NaiveTime::MIN)
    }

    /// Start of the trial window that ends with the period. A window
    /// reaching past the calendar's start begins at `NaiveDateTime::MIN`.
    pub fn trial_cutoff(self, trial_days: u32) -> NaiveDateTime {
        TimeDelta::try_days(i64::from(trial_days))
            .and_then(|window| self.end().checked_sub_signed(window))
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// `<root>/<year>/<month>`
    pub fn dir(self, root: &Path) -> PathBuf {
        root.join(format!("{:04}", self.year))
            .join(format!("{:02}", self.month))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn section(yaml: &str) -> Mapping {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn env() -> Env {
        Env::mock([("HOME", "/home/u")])
    }

    #[test]
    fn defaults() {
        let (config, warnings) = BillTeamsConfig::from_mapping(&Mapping::new(), &env());
        assert_eq!(
            config.root_directory,
            PathBuf::from("/home/u/.local/share/elapi/bill_teams")
        );
        assert_eq!(config.owners_info_path, None);
        assert_eq!(config.unit_price, 0.0);
        assert_eq!(config.trial_days, 0);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.retry_backoff, INITIAL_BACKOFF);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unit_price"));
    }

    #[test]
    fn configured_values_are_expanded() {
        let (config, warnings) = BillTeamsConfig::from_mapping(
            &section(
                "root_directory: ~/billing\nowners_info_path: ~/owners.yaml\nunit_price: 12.5\ntrial_days: 60\ncurrency: CHF\nretry_backoff: 0.5\n",
            ),
            &env(),
        );
        assert!(warnings.is_empty());
        assert_eq!(config.root_directory, PathBuf::from("/home/u/billing"));
        assert_eq!(
            config.owners_info_path,
            Some(PathBuf::from("/home/u/owners.yaml"))
        );
        assert_eq!(config.unit_price, 12.5);
        assert_eq!(config.trial_days, 60);
        assert_eq!(config.currency, "CHF");
        assert_eq!(config.retry_backoff, Duration::from_millis(500));
    }

    #[test]
    fn bad_values_warn_and_fall_back() {
        let (config, warnings) = BillTeamsConfig::from_mapping(
            &section("unit_price: -3\ntrial_days: soon\ncurrency: 5\ncolour: red\nretry_backoff: 1e30\n"),
            &env(),
        );
        assert_eq!(config.unit_price, 0.0);
        assert_eq!(config.trial_days, 0);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.retry_backoff, INITIAL_BACKOFF);
        assert_eq!(warnings.len(), 5);
    }

    #[test]
    fn period_layout() {
        let period = Period::new(2024, 3).unwrap();
        assert_eq!(period.to_string(), "2024-03");
        assert_eq!(
            period.dir(Path::new("/r")),
            PathBuf::from("/r/2024/03")
        );
        assert_eq!(period.end().to_string(), "2024-04-01 00:00:00");
        assert_eq!(
            Period::new(2023, 12).unwrap().end().to_string(),
            "2024-01-01 00:00:00"
        );
        assert_eq!(
            period.trial_cutoff(10).to_string(),
            "2024-03-22 00:00:00"
        );
    }

    #[test]
    fn trial_window_past_calendar_start_is_clamped() {
        let period = Period::new(2024, 3).unwrap();
        assert_eq!(period.trial_cutoff(u32::MAX), NaiveDateTime::MIN);
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(Period::new(2024, 13).is_err());
        assert!(Period::new(2024, 0).is_err());
    }
}
