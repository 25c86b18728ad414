//! Persistent append-only error log shared by all workers
//!
//! Each record is written with a single `write_all` on a file opened in
//! append mode, so lines from concurrent workers do not tear, but their
//! relative order is unspecified.

use crate::errors::Result;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Creates the parent directory of `path` if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record about `source`. Multi-line details are indented
    /// under the header line.
    pub fn record(&self, source: &Path, message: &str, details: &str) {
        let mut entry = format!(
            "[{}] {}: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            source.display(),
            message
        );
        for line in details.lines().filter(|l| !l.trim().is_empty()) {
            entry.push_str("    ");
            entry.push_str(line);
            entry.push('\n');
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = written {
            error!(log = %self.path.display(), "cannot append to error log: {}", e);
        }
    }
}
