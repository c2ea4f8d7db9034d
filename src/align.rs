//! Multi-year alignment onto the anchor year's key set.
//!
//! The anchor's distinct keys seed an accumulator. Each historical year is
//! left-joined onto it (newest year first) with its metrics suffixed by the
//! year tag, then the anchor's own rows are joined in front. Rows whose zone
//! is the invalid sentinel are dropped, followed by exact duplicates.
//!
//! Only canonical columns are ever loaded, so peak memory is proportional to
//! years × rows × metrics: every stage holds the full table.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    frame::{ColumnId, MetricFrame, RowKey, Vintage, YearSeries},
    normalize::YearTable,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub key: RowKey,
    pub values: Vec<Option<f64>>,
}

/// One row per surviving (region, zone, bracket) of the anchor year, with
/// every year's metrics side by side. `series` lists, for each anchor metric,
/// the columns holding it from newest to oldest.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    pub columns: Vec<ColumnId>,
    pub rows: Vec<MasterRow>,
    pub series: Vec<YearSeries>,
}

impl MasterTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(ColumnId::header).collect()
    }

    /// Dense copy with absent values set to zero.
    pub fn attributes(&self) -> MetricFrame {
        MetricFrame {
            keys: self.rows.iter().map(|row| row.key.clone()).collect(),
            columns: self.columns.clone(),
            values: self
                .rows
                .iter()
                .map(|row| row.values.iter().map(|v| v.unwrap_or(0.0)).collect())
                .collect(),
            series: self.series.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignStats {
    pub anchor_rows: usize,
    pub anchor_keys: usize,
    pub joined_rows: usize,
    pub invalid_zone_rows: usize,
    pub duplicate_rows: usize,
}

/// Builds the master table. Historical years are processed newest first
/// whatever order they arrive in.
pub fn align(
    anchor: &YearTable,
    historical: &[YearTable],
    invalid_zone: u32,
) -> (MasterTable, AlignStats) {
    let mut stats = AlignStats {
        anchor_rows: anchor.row_count(),
        ..AlignStats::default()
    };

    let mut accumulated = anchor
        .records
        .iter()
        .map(|record| record.key.clone())
        .unique()
        .map(|key| MasterRow {
            key,
            values: Vec::new(),
        })
        .collect::<Vec<_>>();
    stats.anchor_keys = accumulated.len();

    let mut history_columns = Vec::new();
    let ordered = historical
        .iter()
        .sorted_by(|a, b| b.vintage.cmp(&a.vintage))
        .collect::<Vec<_>>();
    for year in ordered {
        let Vintage::Year(tag) = &year.vintage else {
            continue;
        };
        history_columns.extend(
            year.metrics
                .iter()
                .map(|metric| ColumnId::year(metric.clone(), tag.clone())),
        );
        accumulated = left_join(accumulated, year);
        info!(
            "Joined {} ({} row(s), {} metric(s)) -> {} row(s)",
            year.source,
            year.row_count(),
            year.metrics.len(),
            accumulated.len()
        );
    }

    let mut by_key: HashMap<&RowKey, Vec<usize>> = HashMap::new();
    for (idx, row) in accumulated.iter().enumerate() {
        by_key.entry(&row.key).or_default().push(idx);
    }
    let mut rows = Vec::with_capacity(anchor.records.len());
    for record in &anchor.records {
        for &idx in by_key.get(&record.key).into_iter().flatten() {
            let mut values = record.values.clone();
            values.extend_from_slice(&accumulated[idx].values);
            rows.push(MasterRow {
                key: record.key.clone(),
                values,
            });
        }
    }
    stats.joined_rows = rows.len();

    let before = rows.len();
    rows.retain(|row| row.key.zone != invalid_zone);
    stats.invalid_zone_rows = before - rows.len();

    let before = rows.len();
    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row_fingerprint(row)));
    stats.duplicate_rows = before - rows.len();

    let mut columns = anchor
        .metrics
        .iter()
        .map(|metric| ColumnId::anchor(metric.clone()))
        .collect::<Vec<_>>();
    columns.extend(history_columns);
    let series = anchor
        .metrics
        .iter()
        .map(|metric| YearSeries::collect(metric, &columns))
        .collect();

    info!(
        "Master table: {} row(s) x {} column(s); dropped {} invalid-zone and {} duplicate row(s)",
        rows.len(),
        columns.len(),
        stats.invalid_zone_rows,
        stats.duplicate_rows
    );
    (
        MasterTable {
            columns,
            rows,
            series,
        },
        stats,
    )
}

/// Relational left join on the full key: unmatched rows get `None` for every
/// metric of `year`; a key repeated in `year` repeats the left row.
fn left_join(left: Vec<MasterRow>, year: &YearTable) -> Vec<MasterRow> {
    let mut lookup: HashMap<&RowKey, Vec<usize>> = HashMap::new();
    for (idx, record) in year.records.iter().enumerate() {
        lookup.entry(&record.key).or_default().push(idx);
    }
    let width = year.metrics.len();
    let mut joined = Vec::with_capacity(left.len());
    for row in left {
        match lookup.get(&row.key) {
            Some(matches) => {
                for &idx in matches {
                    let mut values = row.values.clone();
                    values.extend_from_slice(&year.records[idx].values);
                    joined.push(MasterRow {
                        key: row.key.clone(),
                        values,
                    });
                }
            }
            None => {
                let mut row = row;
                row.values.extend(std::iter::repeat_n(None, width));
                joined.push(row);
            }
        }
    }
    joined
}

/// Hashable identity of a row. `-0.0` and `0.0` compare equal.
fn row_fingerprint(row: &MasterRow) -> (RowKey, Vec<Option<u64>>) {
    let bits = |value: f64| if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() };
    (
        row.key.clone(),
        row.values.iter().map(|v| v.map(bits)).collect(),
    )
}
