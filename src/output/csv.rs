//! Append-only CSV table for feature rows

use crate::features::FeatureValue;
use crate::QuarryError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Literal written in place of a feature value that could not be computed
pub const SENTINEL: &str = "Could not compute";

/// Append-only CSV table aligned with a fixed feature-name list
///
/// The header row is written exactly once, when the file does not exist
/// yet; resumed runs keep appending below the existing rows.
pub struct FeatureTable {
    path: PathBuf,
    columns: usize,
}

impl FeatureTable {
    /// Opens the table, writing the header row if the file is new
    pub fn open(path: &Path, feature_names: &[String]) -> Result<Self, QuarryError> {
        let table = Self {
            path: path.to_path_buf(),
            columns: feature_names.len(),
        };
        if !path.is_file() {
            table.write_line(feature_names.iter().map(String::as_str))?;
        }
        Ok(table)
    }

    /// Appends one row of feature values
    ///
    /// The row length is enforced here so no partial or ragged row can ever
    /// reach the table.
    pub fn append_row(&self, row: &[FeatureValue]) -> Result<(), QuarryError> {
        assert_eq!(
            row.len(),
            self.columns,
            "feature row length must match the header"
        );
        let cells: Vec<String> = row.iter().map(FeatureValue::to_string).collect();
        self.write_line(cells.iter().map(String::as_str))
    }

    fn write_line<'a>(&self, cells: impl Iterator<Item = &'a str>) -> Result<(), QuarryError> {
        let line = cells.map(escape_cell).collect::<Vec<_>>().join(",");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| QuarryError::Output {
                path: self.path.display().to_string(),
                source,
            })?;
        writeln!(file, "{}", line).map_err(|source| QuarryError::Output {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Minimal RFC 4180 quoting: only cells containing a delimiter, quote, or
/// newline are wrapped
fn escape_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
