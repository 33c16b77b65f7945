use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use polars::{
    frame::DataFrame,
    prelude::{CsvWriter, SchemaRef, SerWriter},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::info;

use crate::{
    error::{IoError, TrackerResult},
    report::polars_ext::DataFrameExt,
};

// ================================================================================================
// Traits
// ================================================================================================

/// Common interface of every table the crate hands to a sink.
pub trait Report {
    fn as_df(&self) -> &DataFrame;
}

pub trait ReportName {
    fn base_name(&self) -> String;

    fn filename(&self, ext: FileExtension) -> String {
        format!("{}.{}", self.base_name(), ext)
    }
}

pub trait ToSchema {
    /// Returns the canonical schema for this report type.
    fn to_schema() -> SchemaRef;
}

pub trait ToJson {
    /// Serializes the report to a `Value::Array` of row objects.
    ///
    /// Undefined values are written as JSON `null`.
    fn to_json(&self) -> TrackerResult<Value>;
}

pub trait ToCsv {
    /// Writes the report to `<dir>/<base_name>.csv` and returns the file path.
    ///
    /// # Side Effects
    /// - Creates the directory if missing.
    /// - Overwrites the file if it exists.
    /// - Undefined values are written as empty fields.
    fn to_csv(&self, dir: impl AsRef<Path>) -> TrackerResult<PathBuf>;
}

// ================================================================================================
// Blanket Implementations
// ================================================================================================

impl<T> ToJson for T
where
    T: Report,
{
    fn to_json(&self) -> TrackerResult<Value> {
        let rows = self.as_df().to_json_rows()?;
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

impl<T> ToCsv for T
where
    T: Report + ReportName,
{
    fn to_csv(&self, dir: impl AsRef<Path>) -> TrackerResult<PathBuf> {
        let dir = dir.as_ref();
        ensure_dir(dir)?;

        let file_path = dir.join(self.filename(FileExtension::Csv));
        let file = File::create(&file_path).map_err(|e| {
            IoError::WriterCreation(format!("{}: {e}", file_path.display()))
        })?;

        let mut df = self.as_df().clone();
        CsvWriter::new(BufWriter::new(file))
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| {
                IoError::WriteFailed(format!(
                    "Failed to write CSV to '{}': {e}",
                    file_path.display()
                ))
            })?;

        info!(path = %file_path.display(), rows = df.height(), "Exported CSV");
        Ok(file_path)
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> TrackerResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::FileSystem(format!(
                "Failed to create directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FileExtension {
    Csv,
    Json,
}
