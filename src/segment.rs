//! Year-boundary segmentation of a time axis
//!
//! Raw time values are bucketed into calendar years with a days-per-year
//! approximation. The scan emits contiguous inclusive index ranges, one per
//! year, that together cover every time step of the file.

use crate::config::Frequency;
use crate::metadata::{TimeIndex, TimeUnitKind};
use std::collections::HashSet;
use thiserror::Error;

/// Calendars bucketed with 365.25 days per year
const GREGORIAN_LIKE: [&str; 4] = ["standard", "gregorian", "proleptic_gregorian", "julian"];

/// Earliest year that fits a four-digit output file name
pub const MIN_YEAR: i32 = 0;

/// Latest year that fits a four-digit output file name
pub const MAX_YEAR: i32 = 9999;

/// Time axes that cannot be cut into one segment per year
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("time value {value} at index {index} falls outside years 0000-9999")]
    YearOutOfRange { index: usize, value: f64 },

    /// Two segments would write the same `<basename>.<YYYY>.nc`
    #[error("year {year} starts again at index {index} after a later year")]
    RepeatedYear { year: i32, index: usize },
}

/// Contiguous inclusive index range `[start, end]` tagged with its year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearSegment {
    pub year: i32,
    pub start: usize,
    pub end: usize,
}

impl YearSegment {
    /// Number of time steps covered by the segment
    pub fn steps(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Days per year used to bucket day offsets into years
pub fn days_per_year(calendar: &str) -> f64 {
    let calendar = calendar.trim().to_ascii_lowercase();
    if GREGORIAN_LIKE.contains(&calendar.as_str()) {
        365.25
    } else {
        365.0
    }
}

/// How time values map to years
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearRule {
    pub base_year: i32,
    pub kind: TimeUnitKind,
    pub frequency: Frequency,
    pub days_per_year: f64,
}

impl YearRule {
    pub fn for_index(index: &TimeIndex, frequency: Frequency) -> Self {
        Self {
            base_year: index.units.base_year,
            kind: index.units.kind,
            frequency,
            days_per_year: days_per_year(&index.axis.calendar),
        }
    }

    /// Calendar year of a single time value.
    ///
    /// Monthly data stamped at the end of each month gets a half-day offset so
    /// the December value stays in its own year. Returns `None` when the year
    /// falls outside [`MIN_YEAR`]..=[`MAX_YEAR`], which is where unmasked fill
    /// values end up.
    pub fn year_of(&self, value: f64) -> Option<i32> {
        let elapsed = match self.kind {
            TimeUnitKind::Months => (value / 12.0).floor(),
            TimeUnitKind::Days => {
                let offset = match self.frequency {
                    Frequency::Monthly => 0.5,
                    Frequency::Daily => 0.0,
                };
                ((value - offset) / self.days_per_year).floor()
            }
        };
        if !elapsed.is_finite() || elapsed.abs() > f64::from(MAX_YEAR) {
            return None;
        }
        let year = self.base_year.checked_add(elapsed as i32)?;
        (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
    }
}

/// Splits the first `total_steps` entries of `values` into year segments.
///
/// Blank values never start a new segment; they stay with the segment that
/// is open when they are reached, and leading blanks join the first segment.
/// Returns no segments when no value resolves to a year.
///
/// # Errors
///
/// Fails when a value maps outside the four-digit year range, or when a year
/// that was already closed opens again.
pub fn segment_years(
    values: &[Option<f64>],
    total_steps: usize,
    rule: &YearRule,
) -> Result<Vec<YearSegment>, SegmentError> {
    let mut segments = Vec::new();
    let mut closed = HashSet::new();
    let mut current: Option<(i32, usize)> = None;

    for (idx, value) in values.iter().take(total_steps).enumerate() {
        let Some(value) = *value else { continue };
        let year = rule
            .year_of(value)
            .ok_or(SegmentError::YearOutOfRange { index: idx, value })?;

        match current {
            None => current = Some((year, 0)),
            Some((open_year, start)) if open_year != year => {
                segments.push(YearSegment {
                    year: open_year,
                    start,
                    end: idx - 1,
                });
                closed.insert(open_year);
                if closed.contains(&year) {
                    return Err(SegmentError::RepeatedYear { year, index: idx });
                }
                current = Some((year, idx));
            }
            Some(_) => {}
        }
    }

    if let Some((year, start)) = current {
        segments.push(YearSegment {
            year,
            start,
            end: total_steps - 1,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(base_year: i32, dpy: f64) -> YearRule {
        YearRule {
            base_year,
            kind: TimeUnitKind::Days,
            frequency: Frequency::Daily,
            days_per_year: dpy,
        }
    }

    #[test]
    fn calendar_days_per_year() {
        assert_eq!(days_per_year("standard"), 365.25);
        assert_eq!(days_per_year("Gregorian"), 365.25);
        assert_eq!(days_per_year("proleptic_gregorian"), 365.25);
        assert_eq!(days_per_year("noleap"), 365.0);
        assert_eq!(days_per_year("365_day"), 365.0);
    }

    #[test]
    fn single_value_yields_one_segment() {
        let segs = segment_years(&[Some(10.0)], 1, &daily(1850, 365.0)).unwrap();
        assert_eq!(segs, vec![YearSegment { year: 1850, start: 0, end: 0 }]);
    }

    #[test]
    fn empty_values_yield_nothing() {
        assert!(segment_years(&[], 0, &daily(1850, 365.0)).unwrap().is_empty());
        assert!(segment_years(&[None, None], 2, &daily(1850, 365.0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn blank_at_boundary_does_not_close_early() {
        let values = [Some(363.0), Some(364.0), None, Some(365.0), Some(366.0)];
        let segs = segment_years(&values, 5, &daily(1850, 365.0)).unwrap();
        assert_eq!(
            segs,
            vec![
                YearSegment { year: 1850, start: 0, end: 2 },
                YearSegment { year: 1851, start: 3, end: 4 },
            ]
        );
    }

    #[test]
    fn months_units_divide_by_twelve() {
        let rule = YearRule {
            base_year: 1900,
            kind: TimeUnitKind::Months,
            frequency: Frequency::Monthly,
            days_per_year: 365.0,
        };
        assert_eq!(rule.year_of(0.0), Some(1900));
        assert_eq!(rule.year_of(11.0), Some(1900));
        assert_eq!(rule.year_of(12.0), Some(1901));
        assert_eq!(rule.year_of(25.0), Some(1902));
    }

    #[test]
    fn end_of_month_stamp_stays_in_year() {
        let rule = YearRule {
            base_year: 1,
            kind: TimeUnitKind::Days,
            frequency: Frequency::Monthly,
            days_per_year: 365.0,
        };
        assert_eq!(rule.year_of(365.0), Some(1));
        assert_eq!(rule.year_of(396.0), Some(2));
        assert_eq!(daily(1, 365.0).year_of(365.0), Some(2));
    }

    #[test]
    fn fill_value_and_negative_years_are_out_of_range() {
        let rule = daily(1850, 365.0);
        assert_eq!(rule.year_of(9.969_209_968_386_869e36), None);
        assert_eq!(rule.year_of(f64::MAX), None);
        assert_eq!(rule.year_of(-365.0 * 1851.0), None);
        assert_eq!(rule.year_of(-365.0 * 1850.0), Some(0));
        assert_eq!(daily(i32::MAX, 365.0).year_of(0.0), None);
    }

    #[test]
    fn unmasked_fill_value_is_an_error_not_a_panic() {
        let values = [Some(0.0), Some(1.0), Some(9.969_209_968_386_869e36), None];
        assert_eq!(
            segment_years(&values, 4, &daily(1850, 365.0)),
            Err(SegmentError::YearOutOfRange {
                index: 2,
                value: 9.969_209_968_386_869e36
            })
        );
    }
}
