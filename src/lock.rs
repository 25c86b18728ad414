//! Job tracking record for a run directory
//!
//! A split run writes a small JSON record naming the owning process and host.
//! The record doubles as a lock: a second run against the same run directory
//! is refused while it exists. It is removed when the [`JobGuard`] drops.

use crate::errors::{Result, SplitError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the job record inside the run directory
pub const JOB_RECORD_NAME: &str = "ru_ne_split.job.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub pid: u32,
    pub host: String,
    pub started_at: String,
    pub output_root: PathBuf,
    pub inputs: usize,
}

impl JobRecord {
    /// Record describing the current process
    pub fn current(output_root: &Path, inputs: usize) -> Self {
        Self {
            pid: std::process::id(),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            started_at: Local::now().to_rfc3339(),
            output_root: output_root.to_path_buf(),
            inputs,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Holds the job record for as long as the run lasts
#[derive(Debug)]
pub struct JobGuard {
    path: PathBuf,
}

impl JobGuard {
    /// Writes `record` into `run_dir`. With `force`, an existing record left
    /// behind by a dead run is replaced instead of refusing to start.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::JobLocked`] if a record already exists and
    /// `force` is false.
    pub fn acquire(run_dir: &Path, record: &JobRecord, force: bool) -> Result<Self> {
        fs::create_dir_all(run_dir)?;
        let path = run_dir.join(JOB_RECORD_NAME);

        match Self::create(&path, record) {
            Err(SplitError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = JobRecord::read(&path).ok();
                if !force {
                    return Err(SplitError::JobLocked {
                        pid: existing.as_ref().map(|r| r.pid).unwrap_or(0),
                        host: existing
                            .map(|r| r.host)
                            .unwrap_or_else(|| "unknown".to_string()),
                        path,
                    });
                }
                warn!(record = %path.display(), "replacing existing job record");
                fs::remove_file(&path)?;
                Self::create(&path, record)
            }
            other => other,
        }
    }

    fn create(path: &Path, record: &JobRecord) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let guard = Self {
            path: path.to_path_buf(),
        };
        file.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
        debug!(record = %path.display(), pid = record.pid, "job record written");
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(record = %self.path.display(), "cannot remove job record: {}", e);
        }
    }
}
