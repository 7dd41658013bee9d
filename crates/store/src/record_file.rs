//! Line-oriented record file handle.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Persistence failure, distinct from validation and business errors.
///
/// The core does not retry: a failed read or write is surfaced
/// immediately to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Handle to one line-oriented data file (one record per line).
///
/// A missing file reads as empty; it is created on first append or
/// rewrite. Single-writer semantics: rewrites replace the whole file,
/// appends add one or more complete records.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all record lines. A missing file yields an empty list.
    pub fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Append a single record line.
    pub fn append_line(&self, line: &str) -> Result<(), StoreError> {
        self.append_lines(&[line.to_string()])
    }

    /// Append several record lines in one write, so a multi-record unit
    /// (e.g. an order header plus its lines) lands together or not at all.
    pub fn append_lines(&self, lines: &[String]) -> Result<(), StoreError> {
        let mut buffer = String::new();
        for line in lines {
            buffer.push_str(line);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(buffer.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))
    }

    /// Replace the whole file with the given record lines.
    pub fn rewrite(&self, lines: &[String]) -> Result<(), StoreError> {
        let mut buffer = String::new();
        for line in lines {
            buffer.push_str(line);
            buffer.push('\n');
        }
        fs::write(&self.path, buffer).map_err(|e| StoreError::io(&self.path, e))
    }
}
