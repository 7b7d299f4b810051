//! Export rendered output to files.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::output::{Format, OutputError};
use crate::path_validator::PathValidator;

/// `<YYYY-MM-DD>_<HHMMSS>_<stub>.<ext>`
pub fn export_file_name(stub: &str, format: Format, now: NaiveDateTime) -> String {
    let stub: String = stub
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!(
        "{}_{}.{}",
        now.format("%Y-%m-%d_%H%M%S"),
        stub.trim_matches('_'),
        format.extension()
    )
}

/// Write `content` to the export target and return the path written.
///
/// `target` may be a directory (a timestamped file is created inside it),
/// a file path (used as is), or `None` for `default_dir`.
pub fn write_export(
    target: Option<&Path>,
    default_dir: &Path,
    stub: &str,
    format: Format,
    content: &str,
) -> Result<PathBuf, OutputError> {
    let now = chrono::Local::now().naive_local();
    let path = match target {
        Some(path) if is_file_target(path) => PathValidator::new([path]).validate()?,
        Some(dir) => PathValidator::new([dir])
            .directories()
            .validate()?
            .join(export_file_name(stub, format, now)),
        None => default_dir.join(export_file_name(stub, format, now)),
    };

    write_atomic(&path, content.as_bytes()).map_err(|source| OutputError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "exported {format} output");
    Ok(path)
}

fn is_file_target(path: &Path) -> bool {
    if path.exists() {
        !path.is_dir()
    } else {
        path.extension().is_some()
    }
}

/// Write to a temp file next to `path`, then move it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap()
    }

    #[test]
    fn file_name_layout() {
        assert_eq!(
            export_file_name("users", Format::Json, at()),
            "2024-03-07_090501_users.json"
        );
        assert_eq!(
            export_file_name("experiments/12", Format::Yaml, at()),
            "2024-03-07_090501_experiments_12.yaml"
        );
    }

    #[test]
    fn export_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            write_export(Some(dir.path()), Path::new("/unused"), "teams", Format::Csv, "a\n")
                .unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_teams.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn export_to_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").join("report.json");
        let path = write_export(Some(&target), dir.path(), "x", Format::Json, "{}").unwrap();
        assert_eq!(path, target);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{}");
    }

    #[test]
    fn export_defaults_to_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(None, dir.path(), "info", Format::Txt, "hi").unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
