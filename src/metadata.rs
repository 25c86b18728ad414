//! Time metadata resolution for NetCDF time series
//!
//! This module reads the time axis of a source file: units, calendar,
//! dimension size and the raw time values. All knowledge about how that
//! information is obtained lives behind [`MetadataProbe`]:
//!
//! - [`NetcdfProbe`] reads it through the netcdf library (typed access).
//! - [`NcoProbe`] parses the text output of `ncdump -h` and `ncks`.

use crate::errors::{Result, SplitError};
use crate::tools::{NcoTools, ToolRunner};
use netcdf::AttributeValue;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Name of the time dimension and coordinate variable
pub const TIME_DIM: &str = "time";

/// Calendar assumed when the time variable carries no `calendar` attribute
pub const DEFAULT_CALENDAR: &str = "standard";

/// Base year used when the units string has no recognisable year
pub const FALLBACK_BASE_YEAR: i32 = 1850;

/// netCDF default fill for `double` variables, returned for unwritten records
pub const NC_FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

/// netCDF default fill for `float` variables
pub const NC_FILL_FLOAT: f32 = 9.969_21e36;

/// Raw time axis of a NetCDF file
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub units: String,
    pub calendar: String,
    pub len: usize,
    /// Time values in file order; `None` marks a blank or missing value
    pub values: Vec<Option<f64>>,
}

impl TimeAxis {
    pub fn first(&self) -> Option<f64> {
        self.values.iter().flatten().next().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.iter().rev().flatten().next().copied()
    }
}

/// Unit of the time coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnitKind {
    Days,
    Months,
}

/// Parsed `<unit> since <date>` units string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub kind: TimeUnitKind,
    pub base_year: i32,
    /// True when no year was found and [`FALLBACK_BASE_YEAR`] was used
    pub base_year_defaulted: bool,
}

impl TimeUnits {
    /// Parses strings such as `days since 1850-01-01 00:00:00`.
    pub fn parse(units: &str) -> std::result::Result<Self, String> {
        let lower = units.trim().to_ascii_lowercase();
        let kind = match lower.split_whitespace().next() {
            Some("days") | Some("day") => TimeUnitKind::Days,
            Some("months") | Some("month") => TimeUnitKind::Months,
            Some(other) => return Err(format!("unsupported time unit '{}'", other)),
            None => return Err("time variable has no units".to_string()),
        };

        let base_year = lower
            .split_once("since")
            .and_then(|(_, rest)| first_four_digit_year(rest));

        Ok(Self {
            kind,
            base_year: base_year.unwrap_or(FALLBACK_BASE_YEAR),
            base_year_defaulted: base_year.is_none(),
        })
    }
}

fn first_four_digit_year(text: &str) -> Option<i32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() == 4)
        .and_then(|run| run.parse().ok())
}

/// Source of time metadata for NetCDF files
pub trait MetadataProbe: Send + Sync {
    /// Reads the full time axis of `path`
    fn time_axis(&self, path: &Path) -> Result<TimeAxis>;

    /// Reads only the time-dimension size of `path`
    fn time_len(&self, path: &Path) -> Result<usize>;
}

/// Time axis together with its parsed units
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    pub axis: TimeAxis,
    pub units: TimeUnits,
}

impl TimeIndex {
    pub fn first(&self) -> Option<f64> {
        self.axis.first()
    }

    pub fn last(&self) -> Option<f64> {
        self.axis.last()
    }
}

/// A time value that does not increase on the value before it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonIncreasing {
    pub index: usize,
    pub value: f64,
    pub previous: f64,
}

/// Finds the first value that repeats or goes back in time. Blanks are skipped.
///
/// Concatenated series pick these up from overlapping restart segments.
pub fn first_non_increasing(values: &[Option<f64>]) -> Option<NonIncreasing> {
    let mut previous: Option<f64> = None;
    for (index, value) in values.iter().enumerate() {
        let Some(value) = *value else { continue };
        if let Some(previous) = previous {
            if value <= previous {
                return Some(NonIncreasing {
                    index,
                    value,
                    previous,
                });
            }
        }
        previous = Some(value);
    }
    None
}

/// Resolves and validates the time index of a source file.
///
/// # Errors
///
/// Returns [`SplitError::Metadata`] if the time dimension is missing or empty,
/// if the units are not day or month based, or if the time values contain
/// duplicates or go backwards.
pub fn resolve_time_index(probe: &dyn MetadataProbe, path: &Path) -> Result<TimeIndex> {
    let axis = probe.time_axis(path)?;
    if axis.len == 0 {
        return Err(SplitError::metadata(path, "time dimension has zero length"));
    }

    let units = TimeUnits::parse(&axis.units).map_err(|msg| SplitError::metadata(path, msg))?;
    if let Some(bad) = first_non_increasing(&axis.values) {
        return Err(SplitError::metadata(
            path,
            format!(
                "time value {} at index {} does not increase on {} (duplicate or overlapping time steps)",
                bad.value, bad.index, bad.previous
            ),
        ));
    }
    if units.base_year_defaulted {
        warn!(
            file = %path.display(),
            units = %axis.units,
            "no 4-digit base year after 'since', assuming {}",
            FALLBACK_BASE_YEAR
        );
    }
    if axis.values.len() != axis.len {
        warn!(
            file = %path.display(),
            values = axis.values.len(),
            steps = axis.len,
            "time value count differs from time dimension size"
        );
    }

    Ok(TimeIndex { axis, units })
}

/// Typed metadata access through the netcdf library
#[derive(Debug, Clone, Default)]
pub struct NetcdfProbe;

fn string_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn numeric_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Floats(v) => v.first().map(|v| f64::from(*v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Ints(v) => v.first().map(|v| f64::from(*v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        _ => None,
    }
}

/// Values marking unwritten or missing time records: `_FillValue` (or the
/// library default when unset) and `missing_value`
fn time_fill_values(var: &netcdf::Variable<'_>) -> Vec<f64> {
    let mut fills = match numeric_attribute(var, "_FillValue") {
        Some(fill) => vec![fill],
        None => vec![NC_FILL_DOUBLE, f64::from(NC_FILL_FLOAT)],
    };
    fills.extend(numeric_attribute(var, "missing_value"));
    fills
}

impl MetadataProbe for NetcdfProbe {
    fn time_axis(&self, path: &Path) -> Result<TimeAxis> {
        let file = netcdf::open(path)?;
        let len = file
            .dimension(TIME_DIM)
            .map(|d| d.len())
            .ok_or_else(|| SplitError::metadata(path, "no time dimension"))?;

        let var = file
            .variable(TIME_DIM)
            .ok_or_else(|| SplitError::metadata(path, "no time coordinate variable"))?;

        let units = string_attribute(&var, "units").unwrap_or_default();
        let calendar =
            string_attribute(&var, "calendar").unwrap_or_else(|| DEFAULT_CALENDAR.to_string());

        let values = if len == 0 {
            Vec::new()
        } else {
            let fills = time_fill_values(&var);
            var.get_values::<f64, _>(..)?
                .into_iter()
                .map(|v| (v.is_finite() && !fills.contains(&v)).then_some(v))
                .collect()
        };

        Ok(TimeAxis {
            units,
            calendar,
            len,
            values,
        })
    }

    fn time_len(&self, path: &Path) -> Result<usize> {
        let file = netcdf::open(path)?;
        file.dimension(TIME_DIM)
            .map(|d| d.len())
            .ok_or_else(|| SplitError::metadata(path, "no time dimension"))
    }
}

/// Metadata access through the `ncdump` and `ncks` command-line tools
#[derive(Clone)]
pub struct NcoProbe {
    runner: Arc<dyn ToolRunner>,
    tools: NcoTools,
}

impl NcoProbe {
    pub fn new(runner: Arc<dyn ToolRunner>, tools: NcoTools) -> Self {
        Self { runner, tools }
    }

    fn header(&self, path: &Path) -> Result<NcHeader> {
        let args = vec!["-h".to_string(), path.display().to_string()];
        let out = self.runner.run(&self.tools.ncdump, &args)?;
        if !out.success {
            return Err(SplitError::metadata(
                path,
                format!("ncdump -h failed: {}", out.failure_summary()),
            ));
        }
        Ok(parse_ncdump_header(&out.stdout))
    }
}

impl MetadataProbe for NcoProbe {
    fn time_axis(&self, path: &Path) -> Result<TimeAxis> {
        let header = self.header(path)?;
        let len = header
            .time_len
            .ok_or_else(|| SplitError::metadata(path, "no time dimension"))?;

        let values = if len == 0 {
            Vec::new()
        } else {
            let args = vec![
                "-H".to_string(),
                "-C".to_string(),
                "-v".to_string(),
                TIME_DIM.to_string(),
                "-s".to_string(),
                "%f\\n".to_string(),
                path.display().to_string(),
            ];
            let out = self.runner.run(&self.tools.ncks, &args)?;
            if !out.success {
                return Err(SplitError::metadata(
                    path,
                    format!("ncks time extraction failed: {}", out.failure_summary()),
                ));
            }
            parse_ncks_values(&out.stdout).map_err(|msg| SplitError::metadata(path, msg))?
        };

        Ok(TimeAxis {
            units: header.units.unwrap_or_default(),
            calendar: header
                .calendar
                .unwrap_or_else(|| DEFAULT_CALENDAR.to_string()),
            len,
            values,
        })
    }

    fn time_len(&self, path: &Path) -> Result<usize> {
        self.header(path)?
            .time_len
            .ok_or_else(|| SplitError::metadata(path, "no time dimension"))
    }
}

/// Time-related facts extracted from an `ncdump -h` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NcHeader {
    pub time_len: Option<usize>,
    pub units: Option<String>,
    pub calendar: Option<String>,
}

/// Parses the `dimensions:` block and `time:` attributes of `ncdump -h` output.
pub fn parse_ncdump_header(text: &str) -> NcHeader {
    let mut header = NcHeader::default();
    let mut in_dimensions = false;

    for raw in text.lines() {
        let line = raw.trim();
        match line {
            "dimensions:" => {
                in_dimensions = true;
                continue;
            }
            "variables:" | "data:" => {
                in_dimensions = false;
                continue;
            }
            _ => {}
        }

        if in_dimensions {
            if let Some((name, rest)) = line.split_once('=') {
                if name.trim() == TIME_DIM {
                    header.time_len = parse_dimension_size(rest);
                }
            }
        } else if let Some(rest) = line.strip_prefix("time:units") {
            header.units = quoted_value(rest);
        } else if let Some(rest) = line.strip_prefix("time:calendar") {
            header.calendar = quoted_value(rest);
        }
    }

    header
}

// "UNLIMITED ; // (1200 currently)" or "1200 ;"
fn parse_dimension_size(rest: &str) -> Option<usize> {
    let rest = rest.trim();
    if rest.starts_with("UNLIMITED") {
        let open = rest.find('(')?;
        rest[open + 1..].split_whitespace().next()?.parse().ok()
    } else {
        rest.trim_end_matches(';').trim().parse().ok()
    }
}

fn quoted_value(rest: &str) -> Option<String> {
    let start = rest.find('"')?;
    let end = rest.rfind('"')?;
    (end > start).then(|| rest[start + 1..end].to_string())
}

/// Parses one-value-per-line `ncks -s` output. Blank lines are skipped and
/// the NCO missing-value marker `_` becomes `None`.
pub fn parse_ncks_values(text: &str) -> std::result::Result<Vec<Option<f64>>, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line == "_" {
                Ok(None)
            } else {
                line.parse::<f64>()
                    .map(Some)
                    .map_err(|_| format!("unparseable time value '{}'", line))
            }
        })
        .collect()
}
