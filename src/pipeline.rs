use std::{fs, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;
use serde::Serialize;

use crate::{
    align::{self, AlignStats},
    cli::RunArgs,
    config::{MissingColumnPolicy, PipelineConfig},
    discover::{self, InputSet},
    frame::Vintage,
    io_utils,
    normalize::{self, YearTable},
    pivot::{self, PivotedTable},
    share,
    trend::{self, TrendStats},
};

/// Counters reported at the end of a run and optionally written as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub anchor_file: String,
    pub historical_files: Vec<String>,
    pub alignment: AlignStats,
    pub master_rows: usize,
    pub master_columns: usize,
    pub raw_trends: TrendStats,
    pub share_trends: TrendStats,
    pub zones: usize,
    pub output_columns: usize,
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(anchor) = &args.anchor {
        config.anchor_file = anchor.clone();
    }
    if args.strict_columns {
        config.missing_columns = MissingColumnPolicy::Fail;
    }
    if let Some(rule) = args.trend_denominator {
        config.trend_denominator = rule;
    }
    config.validate()?;

    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;

    let inputs = discover::discover_inputs(&args.input_dir, &config.anchor_file)?;
    let years = load_years(&inputs, &config, args.delimiter, input_encoding)?;
    let (pivoted, summary) = build(years, &config)?;

    let output_delimiter =
        io_utils::resolve_output_delimiter(Some(args.output.as_path()), args.output_delimiter);
    let mut writer =
        io_utils::open_csv_writer(Some(args.output.as_path()), output_delimiter, output_encoding)?;
    pivoted
        .write_csv(&mut writer)
        .with_context(|| format!("Writing pivoted output to {:?}", args.output))?;
    info!(
        "Wrote {} zone(s) x {} column(s) to {:?}",
        pivoted.row_count(),
        pivoted.headers.len() + 1,
        args.output
    );

    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
    }
    Ok(())
}

/// Reads, normalizes and types every input file. The anchor comes first.
pub fn load_years(
    inputs: &InputSet,
    config: &PipelineConfig,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<YearInputs> {
    let anchor = load_year(&inputs.anchor, Vintage::Anchor, config, delimiter, encoding)?;
    let historical = inputs
        .historical
        .iter()
        .map(|file| {
            load_year(
                &file.path,
                Vintage::Year(file.year.clone()),
                config,
                delimiter,
                encoding,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(YearInputs { anchor, historical })
}

fn load_year(
    path: &Path,
    vintage: Vintage,
    config: &PipelineConfig,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<YearTable> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let normalized = normalize::load_normalized(path, delimiter, encoding, config)
        .with_context(|| format!("Loading {path:?}"))?;
    let table = normalize::parse_year_table(&normalized, vintage, config)
        .with_context(|| format!("Parsing values of {path:?}"))?;
    info!(
        "Loaded {} row(s) with {} metric(s) from {:?}",
        table.row_count(),
        table.metrics.len(),
        path
    );
    Ok(table)
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearInputs {
    pub anchor: YearTable,
    pub historical: Vec<YearTable>,
}

/// Runs every in-memory stage: align, share, trend, assemble, pivot.
pub fn build(
    years: YearInputs,
    config: &PipelineConfig,
) -> Result<(PivotedTable, PipelineSummary)> {
    let (master, alignment) = align::align(&years.anchor, &years.historical, config.invalid_zone);
    let attributes = master.attributes();
    let shares = share::compute_shares(&master);

    let raw_trends = trend::compute_trends(&attributes, config.trend_denominator);
    let share_trends = trend::compute_trends(&shares, config.trend_denominator);
    for (label, stats) in [("value", &raw_trends.stats), ("share", &share_trends.stats)] {
        info!(
            "Computed {} {} trend(s); {} with fewer than two usable years",
            stats.cells, label, stats.zero_denominator_cells
        );
        if stats.gap_cells > 0 {
            info!(
                "{} {} trend(s) have a zero between non-zero years; \
                 their denominator ({:?}) differs from the number of usable transitions",
                stats.gap_cells, label, config.trend_denominator
            );
        }
    }

    let long = pivot::assemble_long(&attributes, &raw_trends, &shares, &share_trends)?;
    let zone_column = config.output_name(&config.zone_column);
    let pivoted = pivot::pivot_by_bracket(&long, &zone_column);

    let summary = PipelineSummary {
        anchor_file: years.anchor.source.clone(),
        historical_files: years.historical.iter().map(|y| y.source.clone()).collect(),
        alignment,
        master_rows: master.row_count(),
        master_columns: master.columns.len(),
        raw_trends: raw_trends.stats,
        share_trends: share_trends.stats,
        zones: pivoted.row_count(),
        output_columns: pivoted.headers.len() + 1,
    };
    Ok((pivoted, summary))
}

fn write_summary(path: &Path, summary: &PipelineSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Serializing run summary")?;
    fs::write(path, json).with_context(|| format!("Writing run summary to {path:?}"))?;
    info!("Run summary written to {path:?}");
    Ok(())
}
