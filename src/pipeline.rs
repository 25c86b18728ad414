//! Per-file split pipeline
//!
//! Each source file moves through
//! `Pending → Segmented → Extracted → Verified → {Retained | Deleted}`.
//! Segment-level failures never stop the remaining segments, but any failure
//! anywhere pins the file to `Retained`: the source is only removed after a
//! fully successful, fully verified run.

use crate::config::{Frequency, RunConfig};
use crate::errorlog::ErrorLog;
use crate::errors::{Result, SplitError};
use crate::extract::{output_path, source_basename, variable_subdir, OutputArtifact, SliceExtractor};
use crate::metadata::{resolve_time_index, MetadataProbe};
use crate::segment::{segment_years, YearRule, YearSegment};
use crate::tools::ToolRunner;
use crate::verify::verify_artifact;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Lifecycle of one source file within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Segmented,
    Extracted,
    Verified,
    Retained,
    Deleted,
}

/// Artifacts produced or accepted during the current invocation
#[derive(Debug, Default)]
pub struct RunState {
    artifacts: Vec<OutputArtifact>,
}

impl RunState {
    pub fn push(&mut self, artifact: OutputArtifact) {
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[OutputArtifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<OutputArtifact> {
        self.artifacts
    }
}

/// Outcome of splitting one source file
#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub state: FileState,
    pub segments: Vec<YearSegment>,
    pub artifacts: Vec<OutputArtifact>,
    pub failures: Vec<SplitError>,
}

impl FileReport {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            state: FileState::Pending,
            segments: Vec::new(),
            artifacts: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    fn advance(&mut self, state: FileState) {
        debug!(file = %self.source.display(), from = ?self.state, to = ?state, "state change");
        self.state = state;
    }

    fn fail(&mut self, error_log: &ErrorLog, err: SplitError) {
        error!(file = %self.source.display(), "{}", err);
        if !matches!(err, SplitError::Extraction { .. }) {
            // extraction failures are logged by the extractor with tool stderr
            error_log.record(&self.source, &err.to_string(), "");
        }
        self.failures.push(err);
    }
}

/// Everything a worker needs to split files
pub struct SplitContext<'a> {
    pub config: &'a RunConfig,
    pub probe: &'a dyn MetadataProbe,
    pub runner: &'a dyn ToolRunner,
    pub error_log: &'a ErrorLog,
}

impl SplitContext<'_> {
    fn frequency_for(&self, source: &Path) -> Frequency {
        if let Some(frequency) = self.config.frequency {
            return frequency;
        }
        let basename = source_basename(source);
        Frequency::infer_from_name(&basename).unwrap_or_else(|| {
            warn!(
                file = %source.display(),
                "cannot infer run frequency from file name, assuming monthly"
            );
            Frequency::Monthly
        })
    }
}

/// Runs the whole pipeline for one source file. Never panics on bad input and
/// never returns early without a report.
pub fn split_file(ctx: &SplitContext<'_>, source: &Path) -> FileReport {
    let mut report = FileReport::new(source);

    let index = match resolve_time_index(ctx.probe, source) {
        Ok(index) => index,
        Err(err) => {
            report.fail(ctx.error_log, err);
            report.advance(FileState::Retained);
            return report;
        }
    };

    let rule = YearRule::for_index(&index, ctx.frequency_for(source));
    report.segments = match segment_years(&index.axis.values, index.axis.len, &rule) {
        Ok(segments) => segments,
        Err(err) => {
            report.fail(ctx.error_log, SplitError::metadata(source, err.to_string()));
            report.advance(FileState::Retained);
            return report;
        }
    };
    if report.segments.is_empty() {
        report.fail(
            ctx.error_log,
            SplitError::metadata(source, "no time value resolves to a year"),
        );
        report.advance(FileState::Retained);
        return report;
    }
    info!(
        file = %source.display(),
        steps = index.axis.len,
        years = report.segments.len(),
        calendar = %index.axis.calendar,
        "segmented time axis"
    );
    report.advance(FileState::Segmented);

    let basename = source_basename(source);
    let variable = variable_subdir(source);
    let extractor = SliceExtractor {
        runner: ctx.runner,
        ncks: &ctx.config.tools.ncks,
        overwrite: ctx.config.overwrite,
        error_log: ctx.error_log,
    };

    let segments = report.segments.clone();
    let mut run_state = RunState::default();
    for segment in &segments {
        let target = output_path(&ctx.config.output_root, &variable, &basename, segment.year);
        match extractor.extract(source, segment, &target) {
            Ok(artifact) => run_state.push(artifact),
            Err(err) => report.fail(ctx.error_log, err),
        }
    }
    report.advance(FileState::Extracted);

    for artifact in run_state.artifacts() {
        if let Err(err) = verify_artifact(ctx.probe, &artifact.path, Some(artifact.expected_steps)) {
            report.fail(ctx.error_log, err);
        }
    }
    report.artifacts = run_state.into_artifacts();
    report.advance(FileState::Verified);

    if !should_delete_source(&report, ctx.config.delete_after_split) {
        if ctx.config.delete_after_split && !report.succeeded() {
            warn!(file = %source.display(), "keeping source because not every year succeeded");
        }
        report.advance(FileState::Retained);
        return report;
    }

    match delete_source(source) {
        Ok(()) => {
            info!(file = %source.display(), "deleted source after verified split");
            report.advance(FileState::Deleted);
        }
        Err(err) => {
            report.fail(ctx.error_log, err);
            report.advance(FileState::Retained);
        }
    }
    report
}

/// Source removal requires a clean run, the delete flag and at least one artifact
pub fn should_delete_source(report: &FileReport, delete_after_split: bool) -> bool {
    delete_after_split && report.succeeded() && !report.artifacts.is_empty()
}

fn delete_source(source: &Path) -> Result<()> {
    fs::remove_file(source)?;
    Ok(())
}
