//! Filesystem locations: config files, XDG directories, path expansion.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{
    APP_NAME, CONFIG_FILENAME, ENV_XDG_CONFIG_HOME, ENV_XDG_DATA_HOME, ENV_XDG_DOWNLOAD_DIR,
    SYSTEM_CONFIG_DIR,
};
use crate::env::Env;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("static regex is valid")
});

/// Expand a leading `~` and `$VAR` / `${VAR}` references.
///
/// Variables that are not set are left as written.
pub fn expand_path(raw: &str, env: &Env) -> PathBuf {
    let expanded = ENV_VAR_RE.replace_all(raw, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        env.var(name).unwrap_or_else(|_| caps[0].to_string())
    });

    if expanded == "~" {
        if let Some(home) = env.home_dir() {
            return home;
        }
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        if let Some(home) = env.home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(expanded.as_ref())
}

/// The three config file locations, in ascending precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocations {
    pub system: PathBuf,
    pub user: Option<PathBuf>,
    pub project: PathBuf,
}

impl ConfigLocations {
    /// Resolve the standard locations for the given working directory.
    pub fn discover(env: &Env, cwd: &Path) -> Self {
        Self {
            system: Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILENAME),
            user: user_config_dir(env).map(|d| d.join(CONFIG_FILENAME)),
            project: cwd.join(CONFIG_FILENAME),
        }
    }

    /// Locations in ascending precedence (system, user, project).
    pub fn ordered(&self) -> Vec<&Path> {
        let mut paths = vec![self.system.as_path()];
        if let Some(user) = &self.user {
            paths.push(user.as_path());
        }
        paths.push(self.project.as_path());
        paths
    }
}

/// `$XDG_CONFIG_HOME`, falling back to `~/.config`.
pub fn user_config_dir(env: &Env) -> Option<PathBuf> {
    env.non_empty(ENV_XDG_CONFIG_HOME)
        .map(PathBuf::from)
        .or_else(|| env.home_dir().map(|h| h.join(".config")))
}

/// `$XDG_DATA_HOME/elapi`, falling back to `~/.local/share/elapi`.
pub fn app_data_dir(env: &Env) -> Option<PathBuf> {
    env.non_empty(ENV_XDG_DATA_HOME)
        .map(PathBuf::from)
        .or_else(|| env.home_dir().map(|h| h.join(".local").join("share")))
        .map(|d| d.join(APP_NAME))
}

/// Export directory fallbacks, in the order they should be tried.
pub fn download_dir_candidates(env: &Env) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    // user-dirs.dirs of the real user
    if env.is_real() {
        if let Some(dir) = dirs::download_dir() {
            candidates.push(dir);
        }
    }
    if let Some(dir) = env.non_empty(ENV_XDG_DOWNLOAD_DIR) {
        candidates.push(expand_path(&dir, env));
    }
    if let Some(home) = env.home_dir() {
        candidates.push(home.join("Downloads"));
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|p| seen.insert(p.clone()));
    candidates
}

/// Classifies OS errors worth a dedicated user hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    PermissionDenied,
    NoSpace,
}

impl ErrorTag {
    pub fn from_io(err: &io::Error) -> Option<Self> {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Some(Self::PermissionDenied),
            io::ErrorKind::StorageFull => Some(Self::NoSpace),
            _ => None,
        }
    }

    pub fn from_errno(errno: Option<i32>) -> Option<Self> {
        errno.and_then(|code| Self::from_io(&io::Error::from_raw_os_error(code)))
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "The path is not writable: permission denied. Choose a directory you own."
            }
            Self::NoSpace => "No space left on device. Free up disk space and try again.",
        }
    }
}
