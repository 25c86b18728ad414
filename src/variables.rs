//! Variable lists for post-processing runs
//!
//! Vanilla variables come from a per-frequency CSV with a classification
//! column. Isotope-tracer experiments (those whose name contains `tag`) also
//! get tag variables, built by pairing each tag identifier with the
//! precipitation prefix/suffix conventions.

use crate::config::Frequency;
use crate::errors::{Result, SplitError};
use std::fs;
use std::path::Path;

const TAG_PREFIXES: [&str; 5] = ["", "PRECRC_", "PRECRL_", "PRECSC_", "PRECSL_"];
const TAG_SUFFIXES: [&str; 5] = ["V", "r", "R", "s", "S"];

pub const TAG_CSV: &str = "variables_to_preprocess_tag.csv";

/// Vanilla variable CSV for a run frequency
pub fn vanilla_csv_name(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Monthly => "variables_to_preprocess_vanilla_month.csv",
        Frequency::Daily => "variables_to_preprocess_vanilla_day.csv",
    }
}

/// A variable name and its zero-padded normalized form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VariableName {
    pub normalized: String,
    pub name: String,
}

impl VariableName {
    fn plain(name: &str) -> Self {
        Self {
            normalized: name.to_string(),
            name: name.to_string(),
        }
    }
}

/// Zero-pads a `LAT<n><S|N>` tag to two digits and a `LON<n><E|W>` tag to
/// three. Anything else is returned unchanged.
pub fn normalize_tag(tag: &str) -> String {
    if tag.len() < 5 || !tag.is_char_boundary(3) {
        return tag.to_string();
    }
    let (prefix, rest) = tag.split_at(3);
    let width = match prefix.to_ascii_uppercase().as_str() {
        "LAT" => 2,
        "LON" => 3,
        _ => return tag.to_string(),
    };

    let Some(direction) = rest.chars().last() else {
        return tag.to_string();
    };
    let digits = &rest[..rest.len() - direction.len_utf8()];
    if !"SNEWsnew".contains(direction)
        || digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return tag.to_string();
    }

    match digits.parse::<u32>() {
        Ok(n) => format!(
            "{}{:0width$}{}",
            prefix.to_ascii_uppercase(),
            n,
            direction.to_ascii_uppercase(),
            width = width
        ),
        Err(_) => tag.to_string(),
    }
}

fn read_csv_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| SplitError::VariableList(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Builds the variables to process for `experiment`, sorted by normalized name.
pub fn variables_for_experiment(
    assets_dir: &Path,
    experiment: &str,
    frequency: Frequency,
) -> Result<Vec<VariableName>> {
    let use_tags = experiment.contains("tag");
    let mut variables = Vec::new();

    for line in read_csv_lines(&assets_dir.join(vanilla_csv_name(frequency)))? {
        let (name, classification) = match line.split_once(',') {
            Some((name, class)) => (name.trim(), class.trim()),
            None => (line.as_str(), ""),
        };
        let keep = match classification {
            "both" => true,
            "tag" => use_tags,
            "no_tag" => !use_tags,
            _ => false,
        };
        if keep {
            variables.push(VariableName::plain(name));
        }
    }

    if use_tags {
        let tags = read_csv_lines(&assets_dir.join(TAG_CSV))?;
        for (prefix, suffix) in TAG_PREFIXES.iter().zip(TAG_SUFFIXES) {
            for tag in &tags {
                variables.push(VariableName {
                    name: format!("{}{}{}", prefix, tag, suffix),
                    normalized: format!("{}{}{}", prefix, normalize_tag(tag), suffix),
                });
            }
        }
    }

    variables.sort();
    Ok(variables)
}
