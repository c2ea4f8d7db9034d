//! Locating the yearly input files.
//!
//! The anchor file is found by name. Historical files are recognised by a
//! two-digit year prefix and a delimited-text extension, and are returned
//! newest first (descending file name). When the anchor name carries a year,
//! no historical file may be newer than it.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;

use crate::{error::PipelineError, frame::YearTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearFile {
    pub year: YearTag,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    pub anchor: PathBuf,
    pub anchor_year: Option<YearTag>,
    pub historical: Vec<YearFile>,
}

fn year_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?P<year>\d{2}).*\.(csv|tsv)$").expect("year file pattern is valid")
    })
}

pub fn discover_inputs(dir: &Path, anchor_name: &str) -> Result<InputSet> {
    let entries = fs::read_dir(dir).with_context(|| format!("Listing input directory {dir:?}"))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Reading entry in {dir:?}"))?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    let inputs = classify(dir, names, anchor_name)?;
    info!(
        "Found anchor {:?} and {} historical file(s) in {:?}",
        inputs.anchor,
        inputs.historical.len(),
        dir
    );
    Ok(inputs)
}

/// Splits directory entries into the anchor and the historical years.
pub fn classify(
    dir: &Path,
    mut names: Vec<String>,
    anchor_name: &str,
) -> Result<InputSet, PipelineError> {
    names.sort_by(|a, b| b.cmp(a));
    let anchor = names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(anchor_name))
        .ok_or_else(|| PipelineError::AnchorNotFound {
            name: anchor_name.to_string(),
            dir: dir.to_path_buf(),
        })?
        .clone();
    let anchor_year = YearTag::from_file_name(&anchor);

    let mut historical: Vec<YearFile> = Vec::new();
    for name in names.iter().filter(|name| **name != anchor) {
        let Some(captures) = year_file_pattern().captures(name) else {
            debug!("Skipping {name:?}: not a year-prefixed data file");
            continue;
        };
        let Some(year) = YearTag::parse(&captures["year"]) else {
            continue;
        };
        let path = dir.join(name);
        if let Some(anchor_year) = &anchor_year {
            if year == *anchor_year {
                return Err(PipelineError::DuplicateYear {
                    year: year.to_string(),
                    first: dir.join(&anchor),
                    second: path,
                });
            }
            if year > *anchor_year {
                return Err(PipelineError::YearAfterAnchor {
                    year: year.to_string(),
                    path,
                    anchor: dir.join(&anchor),
                });
            }
        }
        if let Some(existing) = historical.iter().find(|file| file.year == year) {
            return Err(PipelineError::DuplicateYear {
                year: year.to_string(),
                first: existing.path.clone(),
                second: path,
            });
        }
        historical.push(YearFile { year, path });
    }

    Ok(InputSet {
        anchor: dir.join(anchor),
        anchor_year,
        historical,
    })
}
