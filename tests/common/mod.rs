#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Header shared by the small yearly fixtures: keys plus two metrics.
pub const YEAR_HEADER: &str = "STATEFIPS,STATE,zipcode,agi_stub,N1,A00100";

/// Scratch input directory for yearly files plus room for outputs.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("temp dir");
        fs::create_dir(temp_dir.path().join("input")).expect("create input dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.temp_dir.path().join("input")
    }

    /// Writes a yearly file into the input directory.
    pub fn write_year(&self, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let mut contents = String::from(header);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        let path = self.input_dir().join(name);
        fs::write(&path, contents).expect("write year file");
        path
    }

    /// Writes an arbitrary file at the workspace root.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }
}

/// Reads a CSV into its header and rows.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|record| record.expect("record").iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

/// Looks up a cell by zone and column name.
pub fn cell<'a>(
    headers: &[String],
    rows: &'a [Vec<String>],
    zone: &str,
    column: &str,
) -> Option<&'a str> {
    let idx = headers.iter().position(|h| h == column)?;
    rows.iter()
        .find(|row| row[0] == zone)
        .map(|row| row[idx].as_str())
}
