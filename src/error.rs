use std::path::PathBuf;

use thiserror::Error;

/// Failures the pipeline surfaces to its caller.
///
/// Invalid zones, duplicate rows and zero totals are not represented here:
/// they are data conditions the pipeline resolves (drop, drop, substitute 0)
/// and only reports through logging and the run summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Required column '{column}' is missing from {path:?}")]
    MissingColumn { column: String, path: PathBuf },
    #[error("Key column '{column}' is missing from {path:?}")]
    MissingKeyColumn { column: String, path: PathBuf },
    #[error("Unable to parse {path:?}: {reason}")]
    UnparseableFile { path: PathBuf, reason: String },
    #[error("Invalid value '{value}' for column '{column}' at row {row} in {path:?}")]
    InvalidCell {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },
    #[error("Anchor file '{name}' not found in {dir:?}")]
    AnchorNotFound { name: String, dir: PathBuf },
    #[error("Year '{year}' is provided by both {first:?} and {second:?}")]
    DuplicateYear {
        year: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Year '{year}' in {path:?} is newer than the anchor file {anchor:?}")]
    YearAfterAnchor {
        year: String,
        path: PathBuf,
        anchor: PathBuf,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
