//! Long-to-wide reshaping by income bracket.
//!
//! [`assemble_long`] lines up the anchor values, their trends, the anchor
//! shares and the share trends for every row. [`pivot_by_bracket`] then turns
//! each of those columns into one column per bracket (`{column}_{bracket}`)
//! with one row per zone.

use std::{
    collections::{BTreeSet, HashMap},
    io::Write,
};

use anyhow::{Context, Result, anyhow};

use crate::{
    frame::{ColumnId, MetricFrame, RowKey},
    trend::TrendTable,
};

/// Row-per-key table of named numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub keys: Vec<RowKey>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Joins the four derived tables column-wise. All of them descend from the
/// same master rows, so rows line up by position; keys are still checked.
pub fn assemble_long(
    attributes: &MetricFrame,
    raw_trends: &TrendTable,
    shares: &MetricFrame,
    share_trends: &TrendTable,
) -> Result<LongTable> {
    for (label, keys) in [
        ("raw trends", &raw_trends.keys),
        ("shares", &shares.keys),
        ("share trends", &share_trends.keys),
    ] {
        if keys != &attributes.keys {
            return Err(anyhow!("Rows of {label} do not line up with the master table"));
        }
    }

    let anchor_positions = |frame: &MetricFrame| -> Result<Vec<usize>> {
        frame
            .series
            .iter()
            .map(|series| {
                frame
                    .column_position(&ColumnId::anchor(series.metric.clone()))
                    .ok_or_else(|| anyhow!("Anchor column '{}' is missing", series.metric))
            })
            .collect()
    };
    let attribute_positions = anchor_positions(attributes)?;
    let share_positions = anchor_positions(shares)?;

    let metrics = attributes
        .series
        .iter()
        .map(|series| series.metric.as_str())
        .collect::<Vec<_>>();
    let mut columns = Vec::with_capacity(metrics.len() * 4);
    columns.extend(metrics.iter().map(|m| m.to_string()));
    columns.extend(raw_trends.metrics.iter().map(|m| format!("{m}_trend")));
    columns.extend(metrics.iter().map(|m| format!("{m}_perc")));
    columns.extend(share_trends.metrics.iter().map(|m| format!("{m}_perc_trend")));

    let values = (0..attributes.row_count())
        .map(|row| {
            let mut out = Vec::with_capacity(columns.len());
            out.extend(attribute_positions.iter().map(|&c| attributes.values[row][c]));
            out.extend_from_slice(&raw_trends.values[row]);
            out.extend(share_positions.iter().map(|&c| shares.values[row][c]));
            out.extend_from_slice(&share_trends.values[row]);
            out
        })
        .collect();

    Ok(LongTable {
        keys: attributes.keys.clone(),
        columns,
        values,
    })
}

/// One row per zone; `cells[row]` follows `headers` after the zone column.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotedTable {
    pub zone_column: String,
    pub headers: Vec<String>,
    pub zones: Vec<u32>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotedTable {
    pub fn row_count(&self) -> usize {
        self.zones.len()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn value(&self, zone: u32, header: &str) -> Option<f64> {
        let row = self.zones.iter().position(|z| *z == zone)?;
        let column = self.column_index(header)?;
        self.cells[row][column]
    }

    /// Writes the header row and every zone. Missing (zone, bracket)
    /// combinations are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        let mut header = Vec::with_capacity(self.headers.len() + 1);
        header.push(self.zone_column.clone());
        header.extend(self.headers.iter().cloned());
        writer
            .write_record(&header)
            .context("Writing pivoted headers")?;
        for (zone, row) in self.zones.iter().zip(&self.cells) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(zone.to_string());
            record.extend(row.iter().map(|cell| cell.map(format_number).unwrap_or_default()));
            writer
                .write_record(&record)
                .with_context(|| format!("Writing zone {zone}"))?;
        }
        writer.flush().context("Flushing pivoted output")?;
        Ok(())
    }
}

#[derive(Default)]
struct CellMean {
    sum: f64,
    count: usize,
}

/// Pivots `long` with zone as the row index and bracket as the column index.
/// Zones keep their first-appearance order and brackets ascend. Several rows
/// landing on one (zone, bracket), e.g. a ZIP code shared by two states, are
/// averaged.
pub fn pivot_by_bracket(long: &LongTable, zone_column: &str) -> PivotedTable {
    let brackets = long
        .keys
        .iter()
        .map(|key| key.bracket)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let bracket_slot = brackets
        .iter()
        .enumerate()
        .map(|(idx, bracket)| (*bracket, idx))
        .collect::<HashMap<_, _>>();

    let mut zones = Vec::new();
    let mut zone_slot: HashMap<u32, usize> = HashMap::new();
    let mut acc: Vec<Vec<CellMean>> = Vec::new();
    let width = long.columns.len() * brackets.len();
    for (key, row) in long.keys.iter().zip(&long.values) {
        let slot = *zone_slot.entry(key.zone).or_insert_with(|| {
            zones.push(key.zone);
            acc.push((0..width).map(|_| CellMean::default()).collect());
            zones.len() - 1
        });
        let bracket = bracket_slot[&key.bracket];
        for (column, value) in row.iter().enumerate() {
            let cell = &mut acc[slot][column * brackets.len() + bracket];
            cell.sum += value;
            cell.count += 1;
        }
    }

    let headers = long
        .columns
        .iter()
        .flat_map(|column| brackets.iter().map(move |b| format!("{column}_{b}")))
        .collect();
    let cells = acc
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| (cell.count > 0).then(|| cell.sum / cell.count as f64))
                .collect()
        })
        .collect();

    PivotedTable {
        zone_column: zone_column.to_string(),
        headers,
        zones,
        cells,
    }
}

/// Whole numbers print without a fraction; everything else uses the
/// shortest representation that round-trips.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::YearSeries;

    fn long(rows: &[(&str, u32, u32, &[f64])], columns: &[&str]) -> LongTable {
        LongTable {
            keys: rows
                .iter()
                .map(|(region, zone, bracket, _)| RowKey::new(*region, *zone, *bracket))
                .collect(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values: rows.iter().map(|(_, _, _, values)| values.to_vec()).collect(),
        }
    }

    #[test]
    fn pivot_produces_one_row_per_zone_and_bracket_columns() {
        let table = long(
            &[
                ("CA", 90001, 1, &[10.0, 0.5]),
                ("CA", 90001, 2, &[20.0, 0.25]),
                ("CA", 90002, 2, &[5.0, 0.0]),
            ],
            &["n1", "n1_trend"],
        );
        let pivoted = pivot_by_bracket(&table, "ZIPCODE");
        assert_eq!(pivoted.zones, vec![90001, 90002]);
        assert_eq!(pivoted.headers, vec!["n1_1", "n1_2", "n1_trend_1", "n1_trend_2"]);
        assert_eq!(pivoted.cells[0], vec![Some(10.0), Some(20.0), Some(0.5), Some(0.25)]);
        assert_eq!(pivoted.cells[1], vec![None, Some(5.0), None, Some(0.0)]);
    }

    #[test]
    fn brackets_ascend_and_shared_zones_are_averaged() {
        let table = long(
            &[
                ("CA", 90001, 3, &[1.0]),
                ("NV", 90001, 3, &[3.0]),
                ("CA", 90001, 1, &[7.0]),
            ],
            &["N2"],
        );
        let pivoted = pivot_by_bracket(&table, "ZIPCODE");
        assert_eq!(pivoted.headers, vec!["N2_1", "N2_3"]);
        assert_eq!(pivoted.value(90001, "N2_3"), Some(2.0));
        assert_eq!(pivoted.value(90001, "N2_1"), Some(7.0));
    }

    #[test]
    fn assemble_long_orders_raw_trend_share_share_trend() {
        let columns = vec![ColumnId::anchor("n1"), ColumnId::anchor("A00100")];
        let series = vec![
            YearSeries::collect("n1", &columns),
            YearSeries::collect("A00100", &columns),
        ];
        let keys = vec![RowKey::new("CA", 90001, 1)];
        let frame = |values: Vec<f64>| MetricFrame {
            keys: keys.clone(),
            columns: columns.clone(),
            values: vec![values],
            series: series.clone(),
        };
        let trends = |values: Vec<f64>| TrendTable {
            keys: keys.clone(),
            metrics: vec!["n1".to_string(), "A00100".to_string()],
            values: vec![values],
            stats: Default::default(),
        };
        let long = assemble_long(
            &frame(vec![10.0, 20.0]),
            &trends(vec![0.1, 0.2]),
            &frame(vec![100.0, 100.0]),
            &trends(vec![0.0, 0.5]),
        )
        .expect("assemble");
        assert_eq!(
            long.columns,
            vec![
                "n1",
                "A00100",
                "n1_trend",
                "A00100_trend",
                "n1_perc",
                "A00100_perc",
                "n1_perc_trend",
                "A00100_perc_trend"
            ]
        );
        assert_eq!(long.values[0], vec![10.0, 20.0, 0.1, 0.2, 100.0, 100.0, 0.0, 0.5]);
    }

    #[test]
    fn write_csv_leaves_missing_cells_empty() {
        let table = long(&[("CA", 90001, 1, &[10.0]), ("CA", 90002, 2, &[2.5])], &["N1"]);
        let pivoted = pivot_by_bracket(&table, "ZIPCODE");
        let mut writer = csv::Writer::from_writer(Vec::new());
        pivoted.write_csv(&mut writer).expect("write");
        let output = String::from_utf8(writer.into_inner().expect("inner")).expect("utf8");
        assert_eq!(output, "ZIPCODE,N1_1,N1_2\n90001,10,\n90002,,2.5\n");
    }

    #[test]
    fn format_number_drops_trailing_zero_fraction() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-3.0), "-3");
    }
}
