//! Run configuration
//!
//! A run is described by a [`RunConfig`], loaded from an optional TOML file and
//! then overridden by command-line flags. The same object is handed to every
//! worker; nothing is read from the environment after startup.

use crate::errors::{Result, SplitError};
use crate::tools::NcoTools;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default error log location, relative to the run directory
pub const DEFAULT_ERROR_LOG: &str = "logs/split_by_year.err";

/// Whether a dataset holds monthly or daily samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Frequency {
    Monthly,
    Daily,
}

impl Frequency {
    /// Tag used in file names (`mon` / `day`)
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Monthly => "mon",
            Self::Daily => "day",
        }
    }

    /// Looks for a `.mon.` or `.day.` token in a dot-separated file name
    pub fn infer_from_name(name: &str) -> Option<Self> {
        name.split('.').find_map(|token| match token {
            "mon" => Some(Self::Monthly),
            "day" => Some(Self::Daily),
            _ => None,
        })
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "month" | "monthly" => Ok(Self::Monthly),
            "day" | "daily" => Ok(Self::Daily),
            other => Err(format!(
                "Invalid frequency '{}': expected 'mon' or 'day'",
                other
            )),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where time metadata comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum MetadataBackend {
    /// Typed access through the netcdf library
    #[default]
    Netcdf,
    /// Text output of `ncdump -h` and `ncks`
    Nco,
}

impl FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "netcdf" => Ok(Self::Netcdf),
            "nco" => Ok(Self::Nco),
            other => Err(format!(
                "Invalid metadata backend '{}': expected 'netcdf' or 'nco'",
                other
            )),
        }
    }
}

impl TryFrom<String> for MetadataBackend {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration shared by every worker of a split run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Root under which `<variable>/<basename>.<YYYY>.nc` files are written
    pub output_root: PathBuf,
    /// Directory that relative log and job-record paths are resolved against
    pub run_dir: PathBuf,
    /// Run frequency; inferred from file names when unset
    pub frequency: Option<Frequency>,
    /// Re-extract years whose output already exists
    pub overwrite: bool,
    /// Remove the source once every year was extracted and verified
    pub delete_after_split: bool,
    /// Number of files processed concurrently; defaults to the CPU count
    pub parallelism: Option<usize>,
    /// Only process files of this variable
    pub test_variable: Option<String>,
    /// Directory with the `variables_to_preprocess_*.csv` lists; with
    /// `experiment` set, only that experiment's variables are split
    pub variable_assets: Option<PathBuf>,
    pub experiment: Option<String>,
    pub error_log: PathBuf,
    pub backend: MetadataBackend,
    pub tools: NcoTools,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            run_dir: PathBuf::from("."),
            frequency: None,
            overwrite: false,
            delete_after_split: false,
            parallelism: None,
            test_variable: None,
            variable_assets: None,
            experiment: None,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            backend: MetadataBackend::default(),
            tools: NcoTools::default(),
        }
    }
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_root: Option<PathBuf>,
    pub run_dir: Option<PathBuf>,
    pub frequency: Option<Frequency>,
    pub overwrite: bool,
    pub delete_after_split: bool,
    pub parallelism: Option<usize>,
    pub test_variable: Option<String>,
    pub variable_assets: Option<PathBuf>,
    pub experiment: Option<String>,
    pub error_log: Option<PathBuf>,
    pub backend: Option<MetadataBackend>,
}

impl RunConfig {
    /// Loads a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SplitError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides. Boolean flags can only switch behaviour on.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(root) = overrides.output_root {
            self.output_root = root;
        }
        if let Some(dir) = overrides.run_dir {
            self.run_dir = dir;
        }
        if overrides.frequency.is_some() {
            self.frequency = overrides.frequency;
        }
        self.overwrite |= overrides.overwrite;
        self.delete_after_split |= overrides.delete_after_split;
        if overrides.parallelism.is_some() {
            self.parallelism = overrides.parallelism;
        }
        if overrides.test_variable.is_some() {
            self.test_variable = overrides.test_variable;
        }
        if overrides.variable_assets.is_some() {
            self.variable_assets = overrides.variable_assets;
        }
        if overrides.experiment.is_some() {
            self.experiment = overrides.experiment;
        }
        if let Some(log) = overrides.error_log {
            self.error_log = log;
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.parallelism == Some(0) {
            return Err(SplitError::Config(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(SplitError::Config("output_root is empty".to_string()));
        }
        if self.variable_assets.is_some() != self.experiment.is_some() {
            return Err(SplitError::Config(
                "variable_assets and experiment must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count actually used for the run
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Resolves `path` against the run directory unless it is absolute
    pub fn in_run_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.run_dir.join(path)
        }
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.in_run_dir(&self.error_log)
    }
}
