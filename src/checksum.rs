//! Resumable SHA-256 checksum lists for produced files
//!
//! Lists use the `sha256sum` text format (`<hex>  <relative path>`), so they
//! can also be checked with standard tools. Files already listed are skipped,
//! which lets an interrupted run pick up where it stopped.

use crate::driver::discover_inputs;
use crate::errors::{Result, SplitError};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub digest: String,
    pub relative_path: PathBuf,
}

impl ChecksumEntry {
    pub fn parse(line: &str) -> Result<Self> {
        let (digest, path) = line
            .split_once("  ")
            .ok_or_else(|| SplitError::Checksum(format!("malformed line '{}'", line)))?;
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SplitError::Checksum(format!("bad digest in line '{}'", line)));
        }
        Ok(Self {
            digest: digest.to_ascii_lowercase(),
            relative_path: PathBuf::from(path),
        })
    }

    pub fn to_line(&self) -> String {
        format!("{}  {}\n", self.digest, self.relative_path.display())
    }
}

/// Hex SHA-256 digest of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 20];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Reads a checksum list; a missing list is empty.
pub fn read_checksum_list(list: &Path) -> Result<Vec<ChecksumEntry>> {
    let text = match fs::read_to_string(list) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(ChecksumEntry::parse)
        .collect()
}

#[derive(Debug, Default)]
pub struct ChecksumSummary {
    pub added: usize,
    pub skipped: usize,
    pub failed: Vec<PathBuf>,
}

/// Hashes every `*.nc` under `root` that is not yet in `list` and appends it.
pub fn update_checksum_list(root: &Path, list: &Path) -> Result<ChecksumSummary> {
    let known: HashSet<PathBuf> = read_checksum_list(list)?
        .into_iter()
        .map(|e| e.relative_path)
        .collect();

    let files = discover_inputs(&[root.to_path_buf()])?;
    let mut pending = Vec::new();
    let mut skipped = 0;
    for file in files {
        let relative = file.strip_prefix(root).unwrap_or(&file).to_path_buf();
        if known.contains(&relative) {
            skipped += 1;
        } else {
            pending.push((file, relative));
        }
    }

    if let Some(parent) = list.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let sink = Mutex::new(OpenOptions::new().create(true).append(true).open(list)?);
    let failed = Mutex::new(Vec::new());

    pending.par_iter().for_each(|(file, relative)| {
        let entry = sha256_file(file).map(|digest| ChecksumEntry {
            digest,
            relative_path: relative.clone(),
        });
        let written = entry.and_then(|entry| {
            let mut out = sink.lock().unwrap_or_else(|p| p.into_inner());
            out.write_all(entry.to_line().as_bytes())?;
            Ok(())
        });
        if let Err(e) = written {
            error!(file = %file.display(), "checksum failed: {}", e);
            failed
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(file.clone());
        }
    });

    let failed = failed.into_inner().unwrap_or_else(|p| p.into_inner());
    let summary = ChecksumSummary {
        added: pending.len() - failed.len(),
        skipped,
        failed,
    };
    info!(
        added = summary.added,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        list = %list.display(),
        "checksum list updated"
    );
    Ok(summary)
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub ok: usize,
    pub mismatched: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

/// Recomputes every listed digest relative to `root`.
pub fn check_checksum_list(root: &Path, list: &Path) -> Result<CheckReport> {
    let entries = read_checksum_list(list)?;
    let results: Vec<(PathBuf, Option<bool>)> = entries
        .par_iter()
        .map(|entry| {
            let path = root.join(&entry.relative_path);
            let matched = sha256_file(&path).ok().map(|d| d == entry.digest);
            (entry.relative_path.clone(), matched)
        })
        .collect();

    let mut report = CheckReport::default();
    for (path, matched) in results {
        match matched {
            Some(true) => report.ok += 1,
            Some(false) => {
                warn!(file = %path.display(), "checksum mismatch");
                report.mismatched.push(path);
            }
            None => {
                warn!(file = %path.display(), "listed file is missing");
                report.missing.push(path);
            }
        }
    }
    Ok(report)
}
