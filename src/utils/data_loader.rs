//! Training data loading

use crate::error::{Result, TabularError};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV loader for training data directories
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: usize,
    /// Field separator
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            delimiter: b',',
        }
    }

    /// Set the number of rows used for type inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Set the field separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| TabularError::DataError(format!("cannot open {}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TabularError::DataError(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Load the single CSV file contained in `dir`
    pub fn load_directory(&self, dir: &Path) -> Result<DataFrame> {
        let path = find_single_csv(dir)?;
        debug!(path = %path.display(), "Reading training data");
        let df = self.load_csv(&path)?;
        if df.height() == 0 {
            return Err(TabularError::DataError(format!("{} contains no rows", path.display())));
        }
        Ok(df)
    }
}

/// Read the training table from a directory holding exactly one CSV file
pub fn read_csv_in_directory(dir: impl AsRef<Path>) -> Result<DataFrame> {
    DataLoader::new().load_directory(dir.as_ref())
}

fn find_single_csv(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(TabularError::DataError(format!(
            "data directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();

    match files.len() {
        0 => Err(TabularError::DataError(format!("no CSV file found in {}", dir.display()))),
        1 => Ok(files.remove(0)),
        n => Err(TabularError::DataError(format!(
            "expected one CSV file in {}, found {}",
            dir.display(),
            n
        ))),
    }
}
