//! Batch driver: input discovery and per-file fan-out
//!
//! Every source file is split independently on a bounded worker pool. One
//! file's failure is recorded in its report and never stops the others.

use crate::config::{MetadataBackend, RunConfig};
use crate::errorlog::ErrorLog;
use crate::errors::{Result, SplitError};
use crate::extract::{variable_subdir, ArtifactOrigin};
use crate::lock::{JobGuard, JobRecord};
use crate::metadata::{MetadataProbe, NcoProbe, NetcdfProbe};
use crate::parallel::{get_parallel_info, ParallelConfig};
use crate::pipeline::{split_file, FileReport, FileState, SplitContext};
use crate::tools::{SystemRunner, ToolRunner};
use crate::variables::{variables_for_experiment, VariableName};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Expands files and directories into a sorted, de-duplicated list of `*.nc` files.
pub fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            collect_netcdf_files(input, &mut files)?;
        } else if input.exists() {
            files.push(input.clone());
        } else {
            warn!(input = %input.display(), "input does not exist, skipping");
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn collect_netcdf_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_netcdf_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "nc") {
            files.push(path);
        }
    }
    Ok(())
}

/// Keeps only files of `variable` when a test-mode filter is set
pub fn filter_variable(files: Vec<PathBuf>, variable: Option<&str>) -> Vec<PathBuf> {
    match variable {
        Some(var) => files
            .into_iter()
            .filter(|f| variable_subdir(f) == var)
            .collect(),
        None => files,
    }
}

/// Keeps only files whose variable directory is on the list, under either its
/// raw or normalized name
pub fn filter_variable_list(files: Vec<PathBuf>, variables: &[VariableName]) -> Vec<PathBuf> {
    let allowed: HashSet<&str> = variables
        .iter()
        .flat_map(|v| [v.name.as_str(), v.normalized.as_str()])
        .collect();
    files
        .into_iter()
        .filter(|f| allowed.contains(variable_subdir(f).as_str()))
        .collect()
}

/// Applies the configured experiment variable list and test-mode filter
pub fn select_inputs(config: &RunConfig, files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let files = match (&config.variable_assets, &config.experiment) {
        (Some(assets), Some(experiment)) => {
            let frequency = config.frequency.ok_or_else(|| {
                SplitError::Config("a variable list needs an explicit frequency".to_string())
            })?;
            let variables = variables_for_experiment(assets, experiment, frequency)?;
            let selected = filter_variable_list(files, &variables);
            info!(
                experiment = %experiment,
                variables = variables.len(),
                files = selected.len(),
                "selected inputs from variable list"
            );
            selected
        }
        _ => files,
    };

    let files = filter_variable(files, config.test_variable.as_deref());
    if let Some(var) = &config.test_variable {
        info!(variable = %var, files = files.len(), "test mode: single variable");
    }
    Ok(files)
}

/// Reports for every file of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.files.iter().all(FileReport::succeeded)
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| !r.succeeded())
    }

    fn count_artifacts(&self, origin: ArtifactOrigin) -> usize {
        self.files
            .iter()
            .flat_map(|r| &r.artifacts)
            .filter(|a| a.origin == origin)
            .count()
    }

    pub fn extracted(&self) -> usize {
        self.count_artifacts(ArtifactOrigin::Extracted)
    }

    pub fn already_present(&self) -> usize {
        self.count_artifacts(ArtifactOrigin::AlreadyPresent)
    }

    pub fn deleted_sources(&self) -> usize {
        self.files
            .iter()
            .filter(|r| r.state == FileState::Deleted)
            .count()
    }
}

/// Splits `files` with the given probe and tool runner on `config.parallelism` workers.
pub fn split_files(
    config: &RunConfig,
    probe: &dyn MetadataProbe,
    runner: &dyn ToolRunner,
    files: &[PathBuf],
) -> Result<BatchReport> {
    let error_log = ErrorLog::open(config.error_log_path())?;
    let parallel = ParallelConfig::new(Some(config.effective_parallelism()));
    let pool = parallel.build_pool()?;

    let ctx = SplitContext {
        config,
        probe,
        runner,
        error_log: &error_log,
    };

    let files = pool.install(|| {
        files
            .par_iter()
            .map(|source| split_file(&ctx, source))
            .collect::<Vec<_>>()
    });

    Ok(BatchReport { files })
}

/// Builds the metadata probe selected by the configuration
pub fn make_probe(config: &RunConfig, runner: Arc<dyn ToolRunner>) -> Box<dyn MetadataProbe> {
    match config.backend {
        MetadataBackend::Netcdf => Box::new(NetcdfProbe),
        MetadataBackend::Nco => Box::new(NcoProbe::new(runner, config.tools.clone())),
    }
}

/// Full split run against the real NCO tools: discovery, job record, fan-out.
pub fn run_split(config: &RunConfig, inputs: &[PathBuf], force: bool) -> Result<BatchReport> {
    let files = select_inputs(config, discover_inputs(inputs)?)?;
    if files.is_empty() {
        warn!("no input files to split");
        return Ok(BatchReport::default());
    }

    let record = JobRecord::current(&config.output_root, files.len());
    let _guard = JobGuard::acquire(&config.run_dir, &record, force)?;

    let info = get_parallel_info();
    info!(
        files = files.len(),
        workers = config.effective_parallelism(),
        cores = info.available_cores,
        backend = ?config.backend,
        output_root = %config.output_root.display(),
        "starting split run"
    );

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let probe = make_probe(config, Arc::clone(&runner));
    split_files(config, probe.as_ref(), runner.as_ref(), &files)
}
