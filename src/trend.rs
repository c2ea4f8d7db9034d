//! Year-over-year trend aggregation.
//!
//! For one metric on one row, with values ordered newest first
//! (`v0 .. vn`), each adjacent pair contributes `(v[i] - v[i+1]) / v[i+1]`
//! unless either side is zero. The contributions are summed and divided by a
//! denominator chosen by [`TrendDenominator`]:
//!
//! * `NonZeroYears`: `non_zero_years - 1` (0 when nothing is non-zero). This
//!   reproduces the published numbers but assumes the non-zero years are
//!   contiguous. A zero between two non-zero years leaves the denominator
//!   larger than the number of pairs that actually contributed.
//! * `ValidTransitions`: the number of pairs that contributed.
//!
//! A zero denominator gives a trend of 0. Cells where the two rules disagree
//! are counted in [`TrendStats::gap_cells`].

use serde::Serialize;

use crate::{
    config::TrendDenominator,
    frame::{MetricFrame, RowKey},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub value: f64,
    pub non_zero_years: usize,
    pub valid_transitions: usize,
    pub denominator: usize,
}

impl TrendPoint {
    /// Whether the `non_zero_years - 1` approximation differs from the exact
    /// transition count for this series.
    pub fn has_gap(&self) -> bool {
        self.non_zero_years.saturating_sub(1) != self.valid_transitions
    }
}

/// Trend of one series given newest first.
pub fn series_trend<I>(values: I, rule: TrendDenominator) -> TrendPoint
where
    I: IntoIterator<Item = f64>,
{
    let mut non_zero_years = 0usize;
    let mut valid_transitions = 0usize;
    let mut change_sum = 0.0;
    let mut newer: Option<f64> = None;
    for value in values {
        if value > 0.0 {
            non_zero_years += 1;
        }
        if let Some(newer) = newer
            && newer != 0.0
            && value != 0.0
        {
            change_sum += (newer - value) / value;
            valid_transitions += 1;
        }
        newer = Some(value);
    }
    let denom = match rule {
        TrendDenominator::NonZeroYears => non_zero_years.saturating_sub(1),
        TrendDenominator::ValidTransitions => valid_transitions,
    };
    TrendPoint {
        value: if denom == 0 {
            0.0
        } else {
            change_sum / denom as f64
        },
        non_zero_years,
        valid_transitions,
        denominator: denom,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendStats {
    pub cells: usize,
    pub zero_denominator_cells: usize,
    pub gap_cells: usize,
}

/// One trend per series of the source frame, row-aligned with it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendTable {
    pub keys: Vec<RowKey>,
    pub metrics: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub stats: TrendStats,
}

pub fn compute_trends(frame: &MetricFrame, rule: TrendDenominator) -> TrendTable {
    let mut stats = TrendStats::default();
    let values = frame
        .values
        .iter()
        .map(|row| {
            frame
                .series
                .iter()
                .map(|series| {
                    let point = series_trend(series.values(row), rule);
                    stats.cells += 1;
                    if point.has_gap() {
                        stats.gap_cells += 1;
                    }
                    if point.denominator == 0 {
                        stats.zero_denominator_cells += 1;
                    }
                    point.value
                })
                .collect()
        })
        .collect();
    TrendTable {
        keys: frame.keys.clone(),
        metrics: frame.series.iter().map(|s| s.metric.clone()).collect(),
        values,
        stats,
    }
}
