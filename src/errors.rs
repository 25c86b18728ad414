//! Centralized error handling for RuNeSplit
//!
//! The taxonomy follows the pipeline: metadata failures abort a single file,
//! extraction and verification failures are recorded per segment, and none of
//! them stop the rest of the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for RuNeSplit operations
#[derive(Debug, Error)]
pub enum SplitError {
    /// Time dimension missing, empty, or unreadable
    #[error("metadata error for {}: {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    /// External slicing tool failed for one year segment
    #[error("extraction of year {year} from {} failed: {message}", source_path.display())]
    Extraction {
        source_path: PathBuf,
        year: i32,
        message: String,
    },

    /// Produced artifact failed its post-conditions
    #[error("verification of {} failed: {message}", path.display())]
    Verification { path: PathBuf, message: String },

    /// External tool could not be started at all
    #[error("failed to launch '{program}': {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// NetCDF library errors from the typed metadata backend
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be built
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Another run already holds the job record for this run directory
    #[error("run directory is locked by pid {pid} on {host} (record: {})", path.display())]
    JobLocked { path: PathBuf, pid: u32, host: String },

    /// Malformed checksum list
    #[error("checksum list error: {0}")]
    Checksum(String),

    /// Missing or malformed variable list assets
    #[error("variable list error: {0}")]
    VariableList(String),
}

impl SplitError {
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SplitError::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn verification(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SplitError::Verification {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for SplitError {
    fn from(error: toml::de::Error) -> Self {
        SplitError::Config(error.to_string())
    }
}

impl From<serde_json::Error> for SplitError {
    fn from(error: serde_json::Error) -> Self {
        SplitError::Config(format!("job record: {}", error))
    }
}

/// Result type alias for RuNeSplit operations
pub type Result<T> = std::result::Result<T, SplitError>;
