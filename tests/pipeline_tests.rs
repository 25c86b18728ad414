//! End-to-end pipeline tests against an in-process `ncks` and metadata probe.

mod common;

use common::{daily_noleap_axis, touch_source, FakeNcks, FakeProbe};
use ru_ne_split::config::{Frequency, RunConfig};
use ru_ne_split::driver::{discover_inputs, filter_variable, split_files};
use ru_ne_split::errors::SplitError;
use ru_ne_split::extract::ArtifactOrigin;
use ru_ne_split::metadata::TimeAxis;
use ru_ne_split::pipeline::FileState;
use ru_ne_split::verify::verify_artifact;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn test_config(dir: &TempDir) -> RunConfig {
    RunConfig {
        output_root: dir.path().join("out"),
        run_dir: dir.path().join("run"),
        frequency: Some(Frequency::Daily),
        parallelism: Some(2),
        ..Default::default()
    }
}

fn output(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join("out").join("TS").join(name)
}

#[test]
fn splits_daily_file_into_two_years() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks::default();

    let batch = split_files(&test_config(&dir), &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert!(report.succeeded(), "failures: {:?}", report.failures);
    assert_eq!(report.state, FileState::Retained);
    assert_eq!(ncks.calls(), 2);
    assert_eq!(report.segments.len(), 2);
    assert_eq!((report.segments[0].start, report.segments[0].end), (0, 364));
    assert_eq!((report.segments[1].start, report.segments[1].end), (365, 729));

    let years: Vec<i32> = report.artifacts.iter().map(|a| a.year).collect();
    assert_eq!(years, vec![1850, 1851]);
    assert!(report.artifacts.iter().all(|a| a.expected_steps == 365));
    assert!(output(&dir, "exp.TS.day.1850.nc").exists());
    assert!(output(&dir, "exp.TS.day.1851.nc").exists());
    assert!(source.exists());
}

#[test]
fn rerun_without_overwrite_invokes_no_tools() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks::default();
    let config = test_config(&dir);

    split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    assert_eq!(ncks.calls(), 2);

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    assert_eq!(ncks.calls(), 2);
    assert!(batch.succeeded());
    assert_eq!(batch.already_present(), 2);
    assert_eq!(batch.extracted(), 0);
}

#[test]
fn overwrite_re_extracts_existing_years() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);

    split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    config.overwrite = true;
    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();

    assert_eq!(ncks.calls(), 4);
    assert_eq!(batch.extracted(), 2);
}

#[test]
fn existing_year_is_accepted_and_still_verified() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks::default();

    let existing = output(&dir, "exp.TS.day.1851.nc");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "365").unwrap();

    let batch = split_files(&test_config(&dir), &probe, &ncks, &[source]).unwrap();
    let report = &batch.files[0];

    assert!(report.succeeded());
    assert_eq!(ncks.calls(), 1);
    assert_eq!(
        *ncks.invoked_targets.lock().unwrap(),
        vec![output(&dir, "exp.TS.day.1850.nc")]
    );
    let accepted = report.artifacts.iter().find(|a| a.year == 1851).unwrap();
    assert_eq!(accepted.origin, ArtifactOrigin::AlreadyPresent);
}

#[test]
fn stale_existing_year_fails_verification_and_blocks_deletion() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks::default();

    let existing = output(&dir, "exp.TS.day.1851.nc");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "200").unwrap();

    let mut config = test_config(&dir);
    config.delete_after_split = true;
    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert_eq!(report.state, FileState::Retained);
    assert!(matches!(
        report.failures.as_slice(),
        [SplitError::Verification { .. }]
    ));
    assert!(source.exists());
}

#[test]
fn source_is_deleted_after_full_success() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 3));
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();

    assert_eq!(batch.files[0].state, FileState::Deleted);
    assert_eq!(batch.deleted_sources(), 1);
    assert!(!source.exists());
}

#[test]
fn extraction_failure_keeps_source_and_siblings_continue() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 3));
    let ncks = FakeNcks {
        fail_years: [1851].into_iter().collect(),
        ..Default::default()
    };
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert_eq!(ncks.calls(), 3);
    assert_eq!(report.state, FileState::Retained);
    assert!(source.exists());
    assert!(matches!(
        report.failures.as_slice(),
        [SplitError::Extraction { year: 1851, .. }]
    ));
    assert!(output(&dir, "exp.TS.day.1850.nc").exists());
    assert!(output(&dir, "exp.TS.day.1852.nc").exists());

    let log = fs::read_to_string(config.error_log_path()).unwrap();
    assert!(log.contains("ncks failed for year 1851"));
    assert!(log.contains("injected failure for 1851"));
}

#[test]
fn verification_failure_keeps_source() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(&source, daily_noleap_axis(1850, 2));
    let ncks = FakeNcks {
        short_years: [1850].into_iter().collect(),
        ..Default::default()
    };
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert_eq!(report.state, FileState::Retained);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0]
        .to_string()
        .contains("expected 365 time steps, found 364"));
    assert!(source.exists());
}

#[test]
fn metadata_failure_aborts_only_that_file() {
    let dir = tempdir().unwrap();
    let good = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let bad = touch_source(dir.path(), "TS", "broken.TS.day.nc");
    let probe = FakeProbe::default().with(&good, daily_noleap_axis(1850, 1));
    let ncks = FakeNcks::default();

    let batch = split_files(&test_config(&dir), &probe, &ncks, &[bad.clone(), good]).unwrap();

    assert!(!batch.succeeded());
    assert_eq!(batch.failed_files().count(), 1);
    let failed = batch.failed_files().next().unwrap();
    assert_eq!(failed.source, bad);
    assert_eq!(failed.state, FileState::Retained);
    assert!(matches!(failed.failures[0], SplitError::Metadata { .. }));
    assert_eq!(ncks.calls(), 1);
}

#[test]
fn zero_length_time_dimension_is_metadata_error() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let axis = TimeAxis {
        units: "days since 1850-01-01".to_string(),
        calendar: "noleap".to_string(),
        len: 0,
        values: Vec::new(),
    };
    let probe = FakeProbe::default().with(&source, axis);
    let ncks = FakeNcks::default();

    let batch = split_files(&test_config(&dir), &probe, &ncks, &[source]).unwrap();
    assert!(matches!(
        batch.files[0].failures[0],
        SplitError::Metadata { .. }
    ));
    assert!(batch.files[0].artifacts.is_empty());
    assert_eq!(ncks.calls(), 0);
}

#[test]
fn monthly_end_of_month_stamps_stay_in_one_year() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.mon.nc");
    let axis = TimeAxis {
        units: "days since 2000-01-01 00:00:00".to_string(),
        calendar: "standard".to_string(),
        len: 12,
        values: (0..12).map(|m| Some(15.0 + 30.0 * m as f64)).collect(),
    };
    let probe = FakeProbe::default().with(&source, axis);
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);
    config.frequency = None;

    let batch = split_files(&config, &probe, &ncks, &[source]).unwrap();
    let report = &batch.files[0];

    assert!(report.succeeded());
    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].year, 2000);
    assert_eq!(report.artifacts[0].expected_steps, 12);
    assert!(output(&dir, "exp.TS.mon.2000.nc").exists());
}

fn daily_axis(values: Vec<f64>) -> TimeAxis {
    TimeAxis {
        units: "days since 1850-01-01 00:00:00".to_string(),
        calendar: "noleap".to_string(),
        len: values.len(),
        values: values.into_iter().map(Some).collect(),
    }
}

#[test]
fn restart_overlap_keeps_source_even_with_delete_flag() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    // 1850, 1851, then 1850 again
    let values: Vec<f64> = (0i32..365).chain(365..730).chain(0..365).map(f64::from).collect();
    let probe = FakeProbe::default().with(&source, daily_axis(values));
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert_eq!(report.state, FileState::Retained);
    assert!(matches!(report.failures.as_slice(), [SplitError::Metadata { .. }]));
    assert_eq!(ncks.calls(), 0);
    assert!(source.exists());
    assert!(!output(&dir, "exp.TS.day.1850.nc").exists());

    let log = fs::read_to_string(config.error_log_path()).unwrap();
    assert!(log.contains("duplicate or overlapping time steps"));
}

#[test]
fn duplicated_steps_inside_a_year_keep_source() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let values: Vec<f64> = (0i32..200).chain(150..365).map(f64::from).collect();
    let probe = FakeProbe::default().with(&source, daily_axis(values));
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();

    assert_eq!(batch.files[0].state, FileState::Retained);
    assert!(!batch.succeeded());
    assert_eq!(ncks.calls(), 0);
    assert!(source.exists());
}

#[test]
fn unmasked_fill_value_is_a_metadata_failure() {
    let dir = tempdir().unwrap();
    let source = touch_source(dir.path(), "TS", "exp.TS.day.nc");
    let probe = FakeProbe::default().with(
        &source,
        daily_axis(vec![0.0, 1.0, 9.969_209_968_386_869e36]),
    );
    let ncks = FakeNcks::default();
    let mut config = test_config(&dir);
    config.delete_after_split = true;

    let batch = split_files(&config, &probe, &ncks, &[source.clone()]).unwrap();
    let report = &batch.files[0];

    assert_eq!(report.state, FileState::Retained);
    assert!(report.failures[0].to_string().contains("outside years 0000-9999"));
    assert_eq!(ncks.calls(), 0);
    assert!(source.exists());
}

#[test]
fn empty_artifact_fails_verification() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.nc");
    fs::write(&path, "").unwrap();
    let probe = FakeProbe::default();

    let err = verify_artifact(&probe, &path, Some(1)).unwrap_err();
    assert!(err.to_string().contains("empty"));

    let err = verify_artifact(&probe, &dir.path().join("missing.nc"), None).unwrap_err();
    assert!(err.to_string().contains("missing"));

    let garbage = dir.path().join("garbage.nc");
    fs::write(&garbage, "not netcdf").unwrap();
    let err = verify_artifact(&probe, &garbage, None).unwrap_err();
    assert!(err.to_string().contains("cannot be opened"));
}

#[test]
fn discovery_and_test_variable_filter() {
    let dir = tempdir().unwrap();
    let ts = touch_source(dir.path(), "TS", "exp.TS.mon.nc");
    let prect = touch_source(dir.path(), "PRECT", "exp.PRECT.mon.nc");
    fs::write(dir.path().join("TS").join("notes.txt"), "x").unwrap();

    let files = discover_inputs(&[dir.path().to_path_buf(), ts.clone()]).unwrap();
    assert_eq!(files, vec![prect.clone(), ts.clone()]);

    let only_ts = filter_variable(files.clone(), Some("TS"));
    assert_eq!(only_ts, vec![ts]);
    assert_eq!(filter_variable(files, None).len(), 2);

    let missing = discover_inputs(&[Path::new("/definitely/not/here.nc").to_path_buf()]).unwrap();
    assert!(missing.is_empty());
}
