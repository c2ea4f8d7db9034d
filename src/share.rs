//! Bracket shares: each value as a percentage of its (region, zone) total.

use std::collections::HashMap;

use crate::{align::MasterTable, frame::MetricFrame};

/// Computes a share column for every master column. Totals sum the present
/// values over all bracket rows of a zone; an absent value or a zero total
/// yields a share of 0.
pub fn compute_shares(master: &MasterTable) -> MetricFrame {
    let width = master.columns.len();
    let mut totals: HashMap<(&str, u32), Vec<f64>> = HashMap::new();
    for row in &master.rows {
        let zone_totals = totals
            .entry((row.key.region.as_str(), row.key.zone))
            .or_insert_with(|| vec![0.0; width]);
        for (total, value) in zone_totals.iter_mut().zip(&row.values) {
            *total += value.unwrap_or(0.0);
        }
    }

    let values = master
        .rows
        .iter()
        .map(|row| {
            let zone_totals = &totals[&(row.key.region.as_str(), row.key.zone)];
            row.values
                .iter()
                .zip(zone_totals)
                .map(|(value, total)| share(*value, *total))
                .collect()
        })
        .collect();

    MetricFrame {
        keys: master.rows.iter().map(|row| row.key.clone()).collect(),
        columns: master.columns.clone(),
        values,
        series: master.series.clone(),
    }
}

fn share(value: Option<f64>, total: f64) -> f64 {
    match value {
        Some(value) if total != 0.0 => value / total * 100.0,
        _ => 0.0,
    }
}
