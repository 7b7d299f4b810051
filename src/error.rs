//! Validation error taxonomy.
//!
//! Every configuration, permission and path check reports a
//! [`ValidationError`]. `Runtime` failures are transient and may be
//! retried; `Critical` failures end the process with exit status 1.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// Failure of a configuration or runtime validation step.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Transient failure (network hiccup, interrupted transfer). Retryable.
    #[error("{message}")]
    Runtime { message: String },

    /// Fatal failure. `note` is an optional hint shown to the user.
    #[error("{message}")]
    Critical {
        message: String,
        note: Option<String>,
    },
}

impl ValidationError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::Critical {
            message: message.into(),
            note: None,
        }
    }

    /// Attach a user-facing hint. Runtime errors are returned unchanged.
    pub fn with_note(self, note: impl Into<String>) -> Self {
        match self {
            Self::Critical { message, .. } => Self::Critical {
                message,
                note: Some(note.into()),
            },
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical { .. })
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Critical { note, .. } => note.as_deref(),
            Self::Runtime { .. } => None,
        }
    }
}

/// No candidate path could be created and written to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (path: {}{})", .path.display(), .errno.map(|e| format!(", errno {e}")).unwrap_or_default())]
pub struct PathValidationError {
    pub path: PathBuf,
    pub errno: Option<i32>,
    pub message: String,
}

impl From<PathValidationError> for ValidationError {
    fn from(err: PathValidationError) -> Self {
        let note = crate::config::paths::ErrorTag::from_errno(err.errno)
            .map(|tag| tag.hint().to_string());
        ValidationError::Critical {
            message: err.to_string(),
            note,
        }
    }
}

impl From<ConfigError> for ValidationError {
    fn from(err: ConfigError) -> Self {
        ValidationError::critical(err.to_string())
            .with_note("Fix or remove the offending configuration file and try again.")
    }
}

impl From<ApiError> for ValidationError {
    fn from(err: ApiError) -> Self {
        if err.is_transient() {
            ValidationError::runtime(err.to_string())
        } else {
            ValidationError::critical(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_retryable() {
        let err = ValidationError::runtime("connection reset");
        assert!(err.is_retryable());
        assert!(!err.is_critical());
        assert_eq!(err.note(), None);
    }

    #[test]
    fn critical_carries_note() {
        let err = ValidationError::critical("host missing").with_note("set `host`");
        assert!(err.is_critical());
        assert_eq!(err.note(), Some("set `host`"));
        assert_eq!(err.to_string(), "host missing");
    }

    #[test]
    fn with_note_ignores_runtime() {
        let err = ValidationError::runtime("timeout").with_note("ignored");
        assert_eq!(err.note(), None);
    }

    #[test]
    fn path_error_display_includes_errno() {
        let err = PathValidationError {
            path: PathBuf::from("/nope"),
            errno: Some(13),
            message: "no writable path".into(),
        };
        let text = err.to_string();
        assert!(text.contains("/nope"));
        assert!(text.contains("errno 13"));
    }

    #[test]
    fn path_error_becomes_critical_with_permission_hint() {
        let err: ValidationError = PathValidationError {
            path: PathBuf::from("/root/x"),
            errno: Some(13),
            message: "no writable path".into(),
        }
        .into();
        assert!(err.is_critical());
        assert!(err.note().unwrap().contains("permission"));
    }
}
