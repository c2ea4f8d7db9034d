//! Pipeline configuration.
//!
//! The defaults describe the IRS "ZIP code data (SOI)" individual income tax
//! files: `STATE`, `ZIPCODE` and `AGI_STUB` identify a row and 24 count/amount
//! columns are tracked across years. A YAML file can override any field; fields
//! omitted from the file keep their defaults.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_ANCHOR_FILE: &str = "17zpallagi.csv";

const DEFAULT_METRICS: &[&str] = &[
    "N1", "MARS1", "MARS2", "MARS4", "NUMDEP", "A00100", "N02650", "A02650", "N00200", "A00200",
    "N00900", "A00900", "N02300", "A02300", "N18425", "A18425", "N18500", "A18500", "N09600",
    "A09600", "N09400", "A09400", "N06500", "A06500",
];

/// What to do when a year's file lacks one of the configured metric columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum MissingColumnPolicy {
    /// Drop the column from that year's contribution without a trace.
    Omit,
    /// Drop the column and log a warning.
    #[default]
    Warn,
    /// Abort the run.
    Fail,
}

/// Denominator used when averaging pairwise year-over-year changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum TrendDenominator {
    /// `non_zero_years - 1`. Matches the historical output but miscounts when a
    /// zero sits between two non-zero years.
    #[default]
    NonZeroYears,
    /// Number of adjacent year pairs where both values are non-zero.
    ValidTransitions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Region,
    Zone,
    Bracket,
    Metric,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Region => "region",
            ColumnRole::Zone => "zone",
            ColumnRole::Bracket => "bracket",
            ColumnRole::Metric => "metric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub region_column: String,
    pub zone_column: String,
    pub bracket_column: String,
    pub metrics: Vec<String>,
    /// Output names for canonical metrics whose name is a prefix of another
    /// metric (`N1` vs `N18425`).
    pub renames: BTreeMap<String, String>,
    pub anchor_file: String,
    pub invalid_zone: u32,
    pub missing_columns: MissingColumnPolicy,
    pub trend_denominator: TrendDenominator,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region_column: "STATE".to_string(),
            zone_column: "ZIPCODE".to_string(),
            bracket_column: "AGI_STUB".to_string(),
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            renames: BTreeMap::from([("N1".to_string(), "n1".to_string())]),
            anchor_file: DEFAULT_ANCHOR_FILE.to_string(),
            invalid_zone: 0,
            missing_columns: MissingColumnPolicy::default(),
            trend_denominator: TrendDenominator::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading configuration file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing configuration file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.metrics.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one metric column is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for (name, _) in self.canonical_columns() {
            if name.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "column names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.to_ascii_uppercase()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "column '{name}' is listed more than once"
                )));
            }
        }
        for (source, target) in &self.renames {
            let source_upper = source.to_ascii_uppercase();
            if !self
                .metrics
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&source_upper))
            {
                return Err(PipelineError::InvalidConfig(format!(
                    "rename source '{source}' is not a metric column"
                )));
            }
            let target_upper = target.to_ascii_uppercase();
            if target_upper != source_upper && seen.contains(&target_upper) {
                return Err(PipelineError::InvalidConfig(format!(
                    "rename '{source}' -> '{target}' collides with another column"
                )));
            }
        }
        Ok(())
    }

    /// Canonical columns in output order: the three keys followed by metrics.
    pub fn canonical_columns(&self) -> Vec<(&str, ColumnRole)> {
        let mut columns = vec![
            (self.region_column.as_str(), ColumnRole::Region),
            (self.zone_column.as_str(), ColumnRole::Zone),
            (self.bracket_column.as_str(), ColumnRole::Bracket),
        ];
        columns.extend(self.metrics.iter().map(|m| (m.as_str(), ColumnRole::Metric)));
        columns
    }

    /// Name a canonical column carries after normalization: upper case, unless
    /// a rename applies.
    pub fn output_name(&self, canonical: &str) -> String {
        self.renames
            .iter()
            .find(|(source, _)| source.eq_ignore_ascii_case(canonical))
            .map(|(_, target)| target.clone())
            .unwrap_or_else(|| canonical.to_ascii_uppercase())
    }

    pub fn key_names(&self) -> [String; 3] {
        [
            self.output_name(&self.region_column),
            self.output_name(&self.zone_column),
            self.output_name(&self.bracket_column),
        ]
    }
}
