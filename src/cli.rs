//! Defines command-line interface options using `clap` for the RuNeSplit application.

use crate::config::{ConfigOverrides, Frequency, MetadataBackend};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A CLI tool for splitting NetCDF time series by calendar year
#[derive(Parser, Debug)]
#[command(
    version,
    name = "RuNeSplit",
    about = "Split concatenated NetCDF time series into per-year files"
)]
pub struct Args {
    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split source files into one file per year with ncks
    Split(SplitArgs),
    /// Append SHA-256 checksums of produced files to a list, or check a list
    Checksum(ChecksumArgs),
    /// Print the variables processed for an experiment
    Variables(VariablesArgs),
}

#[derive(clap::Args, Debug)]
pub struct SplitArgs {
    /// Source files, or directories searched recursively for *.nc
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Run configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory for <variable>/<basename>.<YYYY>.nc outputs
    #[arg(short, long)]
    pub output_root: Option<PathBuf>,

    /// Directory holding the error log and job record
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Run frequency (mon or day). Inferred from file names if omitted.
    #[arg(long)]
    pub frequency: Option<Frequency>,

    /// Re-extract years whose output file already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Delete each source file once all of its years are extracted and verified
    #[arg(long)]
    pub delete_after_split: bool,

    /// Number of files split concurrently. Defaults to number of CPU cores.
    #[arg(short = 'j', long)]
    pub parallelism: Option<usize>,

    /// Test mode: only split files of this variable
    #[arg(long)]
    pub test_variable: Option<String>,

    /// Only split variables listed for --experiment in this assets directory
    #[arg(long, requires = "experiment")]
    pub variables_from: Option<PathBuf>,

    /// Experiment whose variable list selects the inputs, e.g. iso-piControl-tag
    #[arg(long, requires = "variables_from")]
    pub experiment: Option<String>,

    /// Error log path, relative to the run directory unless absolute
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Where time metadata is read from (netcdf or nco)
    #[arg(long)]
    pub backend: Option<MetadataBackend>,

    /// Replace a job record left behind by a previous run
    #[arg(long)]
    pub force: bool,
}

impl SplitArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            output_root: self.output_root.clone(),
            run_dir: self.run_dir.clone(),
            frequency: self.frequency,
            overwrite: self.overwrite,
            delete_after_split: self.delete_after_split,
            parallelism: self.parallelism,
            test_variable: self.test_variable.clone(),
            variable_assets: self.variables_from.clone(),
            experiment: self.experiment.clone(),
            error_log: self.error_log.clone(),
            backend: self.backend,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ChecksumArgs {
    /// Directory searched recursively for *.nc files
    pub root: PathBuf,

    /// Checksum list to append to (or check against)
    #[arg(short, long)]
    pub list: PathBuf,

    /// Verify listed checksums instead of adding new ones
    #[arg(long)]
    pub check: bool,
}

#[derive(clap::Args, Debug)]
pub struct VariablesArgs {
    /// Directory containing the variables_to_preprocess_*.csv files
    #[arg(long)]
    pub assets: PathBuf,

    /// Experiment name, e.g. iso-piControl-tag
    #[arg(long)]
    pub experiment: String,

    /// Run frequency (mon or day)
    #[arg(long)]
    pub frequency: Frequency,

    /// Print "name,normalized" pairs instead of names only
    #[arg(long)]
    pub normalized: bool,
}
