use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::TrendDenominator;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Trend multi-year IRS ZIP code statistics by income bracket",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Align yearly files, compute shares and trends, and write the pivoted table
    Run(RunArgs),
    /// List the canonical columns read from every yearly file
    Columns(ColumnsArgs),
    /// Preview the first rows of a CSV file (such as the pivoted output)
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory holding the anchor file and the year-prefixed historical files
    #[arg(short = 'i', long = "input-dir")]
    pub input_dir: PathBuf,
    /// Destination for the pivoted table (`-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// YAML configuration overriding the default column set
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// File name of the most recent year (defaults to 17zpallagi.csv)
    #[arg(long)]
    pub anchor: Option<String>,
    /// Fail when a yearly file lacks a configured metric column
    #[arg(long = "strict-columns")]
    pub strict_columns: bool,
    /// Denominator used to average year-over-year changes
    #[arg(long = "trend-denominator", value_enum)]
    pub trend_denominator: Option<TrendDenominator>,
    /// Write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// Delimiter of the input files (defaults by extension)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter of the output file (defaults by extension)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the output file (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// YAML configuration overriding the default column set
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CSV file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Number of columns to display (0 shows all)
    #[arg(long = "max-columns", default_value_t = 8)]
    pub max_columns: usize,
    /// CSV delimiter character
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (None, _) => Err("Delimiter cannot be empty".to_string()),
                (Some(_), Some(_)) => Err("Delimiter must be a single character".to_string()),
                (Some(c), None) if !c.is_ascii() => Err("Delimiter must be ASCII".to_string()),
                (Some(c), None) => Ok(c as u8),
            }
        }
    }
}
