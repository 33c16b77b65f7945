use std::path::Path;

use itertools::Itertools;
use polars::{
    frame::DataFrame,
    prelude::{LazyCsvReader, LazyFileListReader, PlPath},
};
use tracing::{debug, info};

use crate::error::{DataError, IoError, TrackerResult};

/// The dataset exactly as read from the source, before any narrowing.
#[derive(Debug, Clone)]
pub struct RawObservations {
    df: DataFrame,
}

impl RawObservations {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    /// Returns `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        self.df.shape()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Null count per column, most incomplete first, truncated to `limit` entries.
    pub fn missing_values(&self, limit: usize) -> Vec<(String, usize)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(limit)
            .collect()
    }
}

/// Reads the observation dataset from a CSV file with a header row.
///
/// The whole file is scanned for schema inference since sparse OWID columns
/// are often empty for the first few thousand rows. ISO dates are parsed when
/// possible; the cleaner normalizes whatever comes out.
///
/// # Errors
/// - [`IoError::DataSourceNotFound`] if `path` does not point at a file.
/// - [`IoError::ReaderCreation`] if the CSV cannot be parsed.
pub fn load_observations(path: impl AsRef<Path>) -> TrackerResult<RawObservations> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IoError::DataSourceNotFound(path.display().to_string()).into());
    }

    let uri = path.to_str().ok_or_else(|| {
        IoError::FileSystem(format!(
            "Path contains invalid UTF-8 characters: {}",
            path.display()
        ))
    })?;

    debug!(path = %path.display(), "Reading observation CSV");
    let df = LazyCsvReader::new(PlPath::new(uri))
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_try_parse_dates(true)
        .finish()
        .map_err(|e| IoError::ReaderCreation(format!("{}: {e}", path.display())))?
        .collect()
        .map_err(|e| DataError::DataFrame(format!("Failed to read {}: {e}", path.display())))?;

    let raw = RawObservations::new(df);
    let (rows, cols) = raw.shape();
    info!(path = %path.display(), rows, cols, "Loaded observation dataset");
    Ok(raw)
}
