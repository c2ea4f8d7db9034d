//! In-memory table types shared by every pipeline stage.

use std::{fmt, path::PathBuf};

/// Two-character year identifier taken from a file name prefix (`16zpallagi.csv`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearTag(String);

impl YearTag {
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        (bytes.len() == 2 && bytes.iter().all(u8::is_ascii_digit)).then(|| Self(value.to_string()))
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        name.get(..2).and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for YearTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which file a value column came from. The anchor always sorts after every
/// historical year, so a descending sort puts it first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vintage {
    Year(YearTag),
    Anchor,
}

/// Composite identity of a row: region, zone, bracket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub region: String,
    pub zone: u32,
    pub bracket: u32,
}

impl RowKey {
    pub fn new(region: impl Into<String>, zone: u32, bracket: u32) -> Self {
        Self {
            region: region.into(),
            zone,
            bracket,
        }
    }
}

/// A value column of the master table: one metric from one vintage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnId {
    pub metric: String,
    pub vintage: Vintage,
}

impl ColumnId {
    pub fn anchor(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            vintage: Vintage::Anchor,
        }
    }

    pub fn year(metric: impl Into<String>, year: YearTag) -> Self {
        Self {
            metric: metric.into(),
            vintage: Vintage::Year(year),
        }
    }

    /// Header used for the column: anchor metrics keep their name, historical
    /// ones carry a `_YY` suffix.
    pub fn header(&self) -> String {
        match &self.vintage {
            Vintage::Anchor => self.metric.clone(),
            Vintage::Year(year) => format!("{}_{}", self.metric, year),
        }
    }
}

/// Column positions holding one metric across years, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSeries {
    pub metric: String,
    pub columns: Vec<usize>,
}

impl YearSeries {
    /// Collects every column of `metric` and orders it by vintage, newest first.
    pub fn collect(metric: &str, columns: &[ColumnId]) -> Self {
        let mut points = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.metric == metric)
            .collect::<Vec<_>>();
        points.sort_by(|(_, a), (_, b)| b.vintage.cmp(&a.vintage));
        Self {
            metric: metric.to_string(),
            columns: points.into_iter().map(|(idx, _)| idx).collect(),
        }
    }

    pub fn values<'a>(&'a self, row: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        self.columns.iter().map(|&idx| row[idx])
    }
}

/// Dense numeric table: absent values have already become zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFrame {
    pub keys: Vec<RowKey>,
    pub columns: Vec<ColumnId>,
    pub values: Vec<Vec<f64>>,
    pub series: Vec<YearSeries>,
}

impl MetricFrame {
    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    pub fn column_position(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|column| column == id)
    }
}

/// Untyped table of text cells, as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(source: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}
