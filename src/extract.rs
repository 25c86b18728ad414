//! Per-year slice extraction with `ncks`
//!
//! Output files are named deterministically from the source basename and
//! the year, which is what makes re-runs resumable: an existing output is
//! taken as already produced unless overwriting was requested.

use crate::errorlog::ErrorLog;
use crate::errors::{Result, SplitError};
use crate::metadata::TIME_DIM;
use crate::segment::YearSegment;
use crate::tools::ToolRunner;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How an artifact came to exist in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    Extracted,
    AlreadyPresent,
}

/// One per-year output file and the step count it must contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub year: i32,
    pub expected_steps: usize,
    pub origin: ArtifactOrigin,
}

/// File name of `source` without its `.nc` extension
pub fn source_basename(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".nc") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// Output subdirectory for `source`: the name of the directory holding it
pub fn variable_subdir(source: &Path) -> String {
    source
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_basename(source))
}

/// `<output_root>/<variable>/<basename>.<YYYY>.nc`
///
/// Segmentation only yields years in `0..=9999`, so the year is always four digits.
pub fn output_path(output_root: &Path, variable: &str, basename: &str, year: i32) -> PathBuf {
    output_root
        .join(variable)
        .join(format!("{}.{:04}.nc", basename, year))
}

/// Runs the external range-slicing tool for year segments
pub struct SliceExtractor<'a> {
    pub runner: &'a dyn ToolRunner,
    pub ncks: &'a str,
    pub overwrite: bool,
    pub error_log: &'a ErrorLog,
}

impl SliceExtractor<'_> {
    /// Produces (or accepts) the output for one segment.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::Extraction`] when `ncks` cannot be started or
    /// exits unsuccessfully. The failure is also written to the error log.
    pub fn extract(
        &self,
        source: &Path,
        segment: &YearSegment,
        target: &Path,
    ) -> Result<OutputArtifact> {
        let artifact = |origin| OutputArtifact {
            path: target.to_path_buf(),
            year: segment.year,
            expected_steps: segment.steps(),
            origin,
        };

        if !self.overwrite && target.exists() {
            debug!(output = %target.display(), "output exists, skipping extraction");
            return Ok(artifact(ArtifactOrigin::AlreadyPresent));
        }

        match self.run_ncks(source, segment, target) {
            Ok(()) => {
                info!(
                    year = segment.year,
                    steps = segment.steps(),
                    output = %target.display(),
                    "extracted year"
                );
                Ok(artifact(ArtifactOrigin::Extracted))
            }
            Err((message, details)) => {
                self.error_log.record(
                    source,
                    &format!("ncks failed for year {:04}: {}", segment.year, message),
                    &details,
                );
                Err(SplitError::Extraction {
                    source_path: source.to_path_buf(),
                    year: segment.year,
                    message,
                })
            }
        }
    }

    fn run_ncks(
        &self,
        source: &Path,
        segment: &YearSegment,
        target: &Path,
    ) -> std::result::Result<(), (String, String)> {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                (
                    format!("cannot create {}: {}", dir.display(), e),
                    String::new(),
                )
            })?;
        }

        let args = vec![
            "-O".to_string(),
            "-d".to_string(),
            format!("{},{},{}", TIME_DIM, segment.start, segment.end),
            source.display().to_string(),
            target.display().to_string(),
        ];

        match self.runner.run(self.ncks, &args) {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err((out.failure_summary(), out.stderr)),
            Err(e) => Err((e.to_string(), String::new())),
        }
    }
}
