//! Shared fakes for pipeline tests: an in-process `ncks` and a probe that
//! reads step counts back from the files the fake writes.

#![allow(dead_code)]

use ru_ne_split::errors::{Result, SplitError};
use ru_ne_split::metadata::{MetadataProbe, TimeAxis};
use ru_ne_split::tools::{ToolOutput, ToolRunner};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fake `ncks -O -d time,<s>,<e> <src> <dst>`: writes the slice length into `dst`.
#[derive(Default)]
pub struct FakeNcks {
    pub calls: AtomicUsize,
    /// Years whose extraction exits non-zero
    pub fail_years: HashSet<i32>,
    /// Years whose output is written with one step too few
    pub short_years: HashSet<i32>,
    pub invoked_targets: Mutex<Vec<PathBuf>>,
}

impl FakeNcks {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn year_of_target(target: &str) -> Option<i32> {
    let stem = target.strip_suffix(".nc")?;
    stem.rsplit('.').next()?.parse().ok()
}

impl ToolRunner for FakeNcks {
    fn run(&self, _program: &str, args: &[String]) -> Result<ToolOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let range = &args[2];
        let target = &args[4];
        self.invoked_targets
            .lock()
            .unwrap()
            .push(PathBuf::from(target));

        let year = year_of_target(target).expect("target carries a year");
        if self.fail_years.contains(&year) {
            return Ok(ToolOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: format!("ncks: ERROR injected failure for {}", year),
            });
        }

        let bounds: Vec<usize> = range
            .trim_start_matches("time,")
            .split(',')
            .map(|v| v.parse().unwrap())
            .collect();
        let mut steps = bounds[1] - bounds[0] + 1;
        if self.short_years.contains(&year) {
            steps -= 1;
        }
        fs::write(target, steps.to_string()).unwrap();
        Ok(ToolOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}

/// Probe serving canned source axes and reading output step counts from disk
#[derive(Default)]
pub struct FakeProbe {
    pub axes: HashMap<PathBuf, TimeAxis>,
}

impl FakeProbe {
    pub fn with(mut self, path: &Path, axis: TimeAxis) -> Self {
        self.axes.insert(path.to_path_buf(), axis);
        self
    }
}

impl MetadataProbe for FakeProbe {
    fn time_axis(&self, path: &Path) -> Result<TimeAxis> {
        self.axes
            .get(path)
            .cloned()
            .ok_or_else(|| SplitError::metadata(path, "no time dimension"))
    }

    fn time_len(&self, path: &Path) -> Result<usize> {
        fs::read_to_string(path)?
            .trim()
            .parse()
            .map_err(|_| SplitError::metadata(path, "not a NetCDF file"))
    }
}

/// Daily noleap axis of `years` whole years starting at day 0
pub fn daily_noleap_axis(base_year: i32, years: usize) -> TimeAxis {
    let n = years * 365;
    TimeAxis {
        units: format!("days since {:04}-01-01 00:00:00", base_year),
        calendar: "noleap".to_string(),
        len: n,
        values: (0..n).map(|v| Some(v as f64)).collect(),
    }
}

/// Creates a placeholder source file at `<dir>/<var>/<name>`
pub fn touch_source(dir: &Path, var: &str, name: &str) -> PathBuf {
    let var_dir = dir.join(var);
    fs::create_dir_all(&var_dir).unwrap();
    let path = var_dir.join(name);
    fs::write(&path, b"CDF\x01 source").unwrap();
    path
}
