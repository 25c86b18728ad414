//! Post-extraction checks on produced artifacts

use crate::errors::{Result, SplitError};
use crate::metadata::MetadataProbe;
use std::fs;
use std::path::Path;

/// Checks that `path` exists, is non-empty, can be opened by the probe and,
/// when `expected_steps` is given, has exactly that many time steps.
///
/// # Errors
///
/// Returns [`SplitError::Verification`] describing the first failed check.
pub fn verify_artifact(
    probe: &dyn MetadataProbe,
    path: &Path,
    expected_steps: Option<usize>,
) -> Result<()> {
    let size = fs::metadata(path)
        .map(|m| m.len())
        .map_err(|_| SplitError::verification(path, "output file is missing"))?;
    if size == 0 {
        return Err(SplitError::verification(path, "output file is empty"));
    }

    let actual = probe
        .time_len(path)
        .map_err(|e| SplitError::verification(path, format!("cannot be opened: {}", e)))?;

    match expected_steps {
        Some(expected) if expected != actual => Err(SplitError::verification(
            path,
            format!("expected {} time steps, found {}", expected, actual),
        )),
        _ => Ok(()),
    }
}
