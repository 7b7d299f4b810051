//! Writability probe for export and registry locations.
//!
//! A candidate passes only if a marker byte written to it can be read
//! back, which rules out special files such as `/dev/null`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::WRITE_PROBE_FILENAME;
use crate::error::PathValidationError;

const MARKER: u8 = b'\x1e';

/// Tries candidate paths in order and returns the first writable one.
#[derive(Debug, Clone)]
pub struct PathValidator {
    candidates: Vec<PathBuf>,
    directories_only: bool,
}

impl PathValidator {
    pub fn new<P: Into<PathBuf>>(candidates: impl IntoIterator<Item = P>) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            directories_only: false,
        }
    }

    /// Treat every candidate as a directory, even when its name has an
    /// extension. Existing non-directories fail the probe.
    pub fn directories(mut self) -> Self {
        self.directories_only = true;
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Probe each candidate. Missing paths are created; anything created
    /// for a candidate that then fails is removed again.
    pub fn validate(&self) -> Result<PathBuf, PathValidationError> {
        let mut last_failure: Option<(PathBuf, io::Error)> = None;

        for path in &self.candidates {
            let mut created = Vec::new();
            match probe(path, self.directories_only, &mut created) {
                Ok(()) => return Ok(path.clone()),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "path is not writable");
                    remove_created(&created);
                    last_failure = Some((path.clone(), err));
                }
            }
        }

        let listed = self
            .candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let (path, errno) = match last_failure {
            Some((path, err)) => (path, err.raw_os_error()),
            None => (PathBuf::new(), None),
        };
        Err(PathValidationError {
            path,
            errno,
            message: format!("none of the candidate paths is writable: [{listed}]"),
        })
    }
}

fn probe(path: &Path, directory: bool, created: &mut Vec<PathBuf>) -> io::Result<()> {
    if !path.exists() {
        if !directory && path.extension().is_some() {
            if let Some(parent) = path.parent() {
                create_missing_dirs(parent, created)?;
            }
            OpenOptions::new().write(true).create_new(true).open(path)?;
            created.push(path.to_path_buf());
        } else {
            create_missing_dirs(path, created)?;
        }
    }

    if directory && !path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", path.display()),
        ));
    }

    if path.is_dir() {
        let probe_path = path.join(WRITE_PROBE_FILENAME);
        let existed = probe_path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&probe_path)?;
        let result = write_marker(&mut file);
        drop(file);
        if !existed {
            fs::remove_file(&probe_path)?;
        }
        result
    } else {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        write_marker(&mut file)
    }
}

/// Append the marker, read it back, then restore the original length.
fn write_marker(file: &mut File) -> io::Result<()> {
    let original_len = file.metadata()?.len();
    file.write_all(&[MARKER])?;
    file.flush()?;
    let read_back = read_byte_at(file, original_len);
    if file.metadata()?.is_file() {
        file.set_len(original_len)?;
    }
    match read_back? {
        MARKER => Ok(()),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("read back {other:#04x} instead of the probe marker"),
        )),
    }
}

fn read_byte_at(file: &mut File, pos: u64) -> io::Result<u8> {
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = [0u8; 1];
    file.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn create_missing_dirs(dir: &Path, created: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    for path in missing {
        fs::create_dir(&path)?;
        created.push(path);
    }
    Ok(())
}

fn remove_created(created: &[PathBuf]) {
    for path in created.iter().rev() {
        let result = if path.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(err) = result {
            tracing::debug!(path = %path.display(), error = %err, "could not remove probe leftover");
        }
    }
}
