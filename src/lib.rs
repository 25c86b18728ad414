//! RuNeSplit: per-year splitting of NetCDF time series
//!
//! RuNeSplit takes concatenated climate-model time series and writes one
//! NetCDF file per calendar year. The NetCDF work itself is delegated to the
//! NCO tools (`ncks`, `ncdump`); this crate does the bookkeeping around them.
//!
//! ## Key Features
//!
//! - **Year detection**: time values are bucketed into calendar years from the
//!   units and calendar of the time coordinate
//! - **Resumable runs**: existing outputs are accepted instead of re-extracted
//! - **Verification**: every output is re-inspected for size and step count
//! - **Safe cleanup**: sources are only deleted after a fully verified split
//! - **Parallel processing**: files are split concurrently on a bounded pool
//!
//! ## Module Organization
//!
//! - [`metadata`]: time-axis resolution through netcdf or NCO text output
//! - [`segment`]: year-boundary segmentation
//! - [`extract`]: per-year `ncks` extraction and output naming
//! - [`verify`]: post-extraction checks
//! - [`pipeline`]: per-file state machine and deletion gate
//! - [`driver`]: input discovery and per-file fan-out
//! - [`checksum`]: resumable checksum lists
//! - [`variables`]: experiment variable lists
//! - [`config`], [`errors`], [`errorlog`], [`lock`], [`parallel`], [`tools`]: run plumbing
//!
//! ## Usage Example
//! ```rust,no_run
//! use ru_ne_split::prelude::*;
//! use std::path::PathBuf;
//!
//! let config = RunConfig::default()
//!     .merge(ConfigOverrides {
//!         output_root: Some(PathBuf::from("/scratch/processed/mon/iso-piControl-tag")),
//!         delete_after_split: true,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! let report = run_split(&config, &[PathBuf::from("/scratch/concat/TS")], false).unwrap();
//! println!("extracted {} years", report.extracted());
//! ```

pub mod checksum;
pub mod cli;
pub mod config;
pub mod driver;
pub mod errorlog;
pub mod errors;
pub mod extract;
pub mod lock;
pub mod metadata;
pub mod parallel;
pub mod pipeline;
pub mod segment;
pub mod tools;
pub mod variables;
pub mod verify;

pub use errors::{Result, SplitError};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{ConfigOverrides, Frequency, MetadataBackend, RunConfig};
    pub use crate::driver::{run_split, split_files, BatchReport};
    pub use crate::errors::{Result, SplitError};
    pub use crate::extract::{ArtifactOrigin, OutputArtifact};
    pub use crate::metadata::{MetadataProbe, NcoProbe, NetcdfProbe, TimeAxis};
    pub use crate::pipeline::{split_file, FileReport, FileState};
    pub use crate::segment::{segment_years, SegmentError, YearRule, YearSegment};
    pub use crate::tools::{SystemRunner, ToolOutput, ToolRunner};
}
