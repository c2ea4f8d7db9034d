//! Schema normalization: reduce a year's raw file to the canonical column set
//! and type its cells.
//!
//! Column matching is case-insensitive. Matched columns take their canonical
//! output name (upper case, or the configured rename for colliding names such
//! as `N1`). Normalizing an already-normalized table returns it unchanged.

use std::path::Path;

use anyhow::anyhow;
use encoding_rs::Encoding;
use log::{debug, warn};

use crate::{
    config::{ColumnRole, MissingColumnPolicy, PipelineConfig},
    error::PipelineError,
    frame::{RawTable, RowKey, Vintage},
    io_utils,
};

/// Source position and output name for one selected canonical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub source_index: usize,
    pub name: String,
    pub role: ColumnRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnSelection {
    pub selected: Vec<SelectedColumn>,
    pub missing: Vec<(String, ColumnRole)>,
}

pub fn select_columns(headers: &[String], config: &PipelineConfig) -> ColumnSelection {
    let mut selection = ColumnSelection::default();
    for (canonical, role) in config.canonical_columns() {
        let output = config.output_name(canonical);
        let position = headers.iter().position(|header| {
            let header = header.trim();
            header.eq_ignore_ascii_case(canonical) || header.eq_ignore_ascii_case(&output)
        });
        match position {
            Some(source_index) => selection.selected.push(SelectedColumn {
                source_index,
                name: output,
                role,
            }),
            None => selection.missing.push((canonical.to_string(), role)),
        }
    }
    selection
}

impl ColumnSelection {
    pub fn headers(&self) -> Vec<String> {
        self.selected.iter().map(|column| column.name.clone()).collect()
    }

    pub fn source_indices(&self) -> Vec<usize> {
        self.selected.iter().map(|column| column.source_index).collect()
    }
}

/// Missing key columns are always an error; missing metrics follow the
/// configured policy.
fn check_missing(
    selection: &ColumnSelection,
    source: &Path,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    for (column, role) in &selection.missing {
        if *role != ColumnRole::Metric {
            return Err(PipelineError::MissingKeyColumn {
                column: column.clone(),
                path: source.to_path_buf(),
            });
        }
        match config.missing_columns {
            MissingColumnPolicy::Omit => {}
            MissingColumnPolicy::Warn => warn!(
                "Column '{}' not found in {}; omitting it for this year",
                column,
                source.display()
            ),
            MissingColumnPolicy::Fail => {
                return Err(PipelineError::MissingColumn {
                    column: column.clone(),
                    path: source.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

/// Projects `raw` onto the canonical columns.
pub fn normalize(raw: &RawTable, config: &PipelineConfig) -> Result<RawTable, PipelineError> {
    let selection = select_columns(&raw.headers, config);
    check_missing(&selection, &raw.source, config)?;
    debug!(
        "Selected {} of {} column(s) from {}",
        selection.selected.len(),
        raw.headers.len(),
        raw.source_name()
    );

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            selection
                .selected
                .iter()
                .map(|column| row.get(column.source_index).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(RawTable::new(raw.source.clone(), selection.headers(), rows))
}

/// Streams a delimited file and keeps only the canonical columns. Fields of
/// other columns are never decoded. Read and decode failures are reported as
/// [`PipelineError::UnparseableFile`].
pub fn load_normalized(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    config: &PipelineConfig,
) -> anyhow::Result<RawTable> {
    let unparseable = |reason: String| PipelineError::UnparseableFile {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|err| unparseable(format!("{err:#}")))?;
    let selection = select_columns(&headers, config);
    check_missing(&selection, path, config)?;
    debug!(
        "Selected {} of {} column(s) from {:?}",
        selection.selected.len(),
        headers.len(),
        path
    );

    let indices = selection.source_indices();
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| unparseable(err.to_string()))?;
        let decoded = io_utils::decode_fields(&record, &indices, encoding)
            .map_err(|err| unparseable(format!("row {}: {err:#}", row_idx + 2)))?;
        rows.push(decoded);
    }
    Ok(RawTable::new(path, selection.headers(), rows))
}

/// One parsed row of a year's file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub key: RowKey,
    pub values: Vec<Option<f64>>,
}

/// A normalized, typed year. `metrics` holds the output names present in this
/// year, aligned with every record's `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct YearTable {
    pub vintage: Vintage,
    pub source: String,
    pub metrics: Vec<String>,
    pub records: Vec<MetricRecord>,
}

impl YearTable {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Types a table produced by [`normalize`]. Every non-key column is a metric.
pub fn parse_year_table(
    table: &RawTable,
    vintage: Vintage,
    config: &PipelineConfig,
) -> Result<YearTable, PipelineError> {
    let [region_name, zone_name, bracket_name] = config.key_names();
    let key_positions = [&region_name, &zone_name, &bracket_name].map(|name| {
        table
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingKeyColumn {
                column: name.clone(),
                path: table.source.clone(),
            })
    });
    let [region_idx, zone_idx, bracket_idx] = key_positions;
    let (region_idx, zone_idx, bracket_idx) = (region_idx?, zone_idx?, bracket_idx?);

    let metric_positions = table
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| ![region_idx, zone_idx, bracket_idx].contains(idx))
        .collect::<Vec<_>>();

    let mut records = Vec::with_capacity(table.rows.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");
        let invalid = |column: &str, value: &str| PipelineError::InvalidCell {
            path: table.source.clone(),
            row: row_idx + 2,
            column: column.to_string(),
            value: value.to_string(),
        };
        let zone = parse_key_number(cell(zone_idx))
            .ok_or_else(|| invalid(&zone_name, cell(zone_idx)))?;
        let bracket = parse_key_number(cell(bracket_idx))
            .ok_or_else(|| invalid(&bracket_name, cell(bracket_idx)))?;
        let key = RowKey::new(cell(region_idx), zone, bracket);
        let values = metric_positions
            .iter()
            .map(|(idx, name)| parse_metric(cell(*idx)).map_err(|_| invalid(name, cell(*idx))))
            .collect::<Result<Vec<_>, _>>()?;
        records.push(MetricRecord { key, values });
    }

    Ok(YearTable {
        vintage,
        source: table.source_name(),
        metrics: metric_positions
            .into_iter()
            .map(|(_, name)| name.clone())
            .collect(),
        records,
    })
}

/// Integral key such as a ZIP code or bracket number. Accepts `90001.0`
/// because spreadsheet exports often write integers that way.
fn parse_key_number(raw: &str) -> Option<u32> {
    if let Ok(value) = raw.parse::<u32>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value)).then_some(value as u32)
}

/// Blank cells and null markers are absent. Infinite values are rejected.
fn parse_metric(raw: &str) -> anyhow::Result<Option<f64>> {
    if raw.is_empty() || is_null_marker(raw) {
        return Ok(None);
    }
    let value = raw.replace(',', "").parse::<f64>()?;
    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(anyhow!("value is not finite"))
    } else {
        Ok(Some(value))
    }
}

fn is_null_marker(raw: &str) -> bool {
    ["NA", "N/A", "NAN", "NULL", "NONE"]
        .iter()
        .any(|marker| raw.eq_ignore_ascii_case(marker))
}
