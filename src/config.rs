use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    data::schema::ObservationCol,
    error::{ConfigError, TrackerResult},
};

/// Countries analysed when no whitelist is supplied.
pub const DEFAULT_ENTITIES: [&str; 7] = [
    "United States",
    "India",
    "Brazil",
    "United Kingdom",
    "Germany",
    "Kenya",
    "South Africa",
];

/// Configuration of a tracker run.
///
/// The entity and column whitelists are supplied externally and never derived
/// from the data. Every field has a default, so a JSON file only needs to
/// carry the fields it overrides.
///
/// # Example
/// ```
/// # use covid_tracker::config::TrackerConfig;
/// let config = TrackerConfig::default()
///     .with_data_path("data/owid-covid-data.csv")
///     .with_entities(["Kenya", "Germany"])
///     .with_rolling_window(14);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// CSV file holding the OWID dataset.
    pub data_path: PathBuf,

    /// Directory receiving the exported CSV files. Created if missing.
    pub output_dir: PathBuf,

    /// Allowlist of entity identifiers (`location` values).
    pub entities: BTreeSet<String>,

    /// Columns to keep, in output order. Must include `location` and `date`.
    pub columns: Vec<String>,

    /// Window length (in rows, i.e. days) of the new-cases moving average.
    pub rolling_window: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/owid-covid-data.csv"),
            output_dir: PathBuf::from("data"),
            entities: DEFAULT_ENTITIES.iter().map(|e| e.to_string()).collect(),
            columns: ObservationCol::source_columns()
                .map(|c| c.as_str().to_string())
                .collect(),
            rolling_window: 7,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rolling_window(mut self, window: u16) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn validate(&self) -> TrackerResult<()> {
        if self.entities.is_empty() {
            return Err(invalid("entity whitelist is empty"));
        }
        if self.columns.is_empty() {
            return Err(invalid("column whitelist is empty"));
        }
        for key in [ObservationCol::Location, ObservationCol::Date] {
            if !self.columns.iter().any(|c| c == key.as_str()) {
                return Err(invalid(&format!(
                    "column whitelist must contain '{key}'"
                )));
            }
        }
        let unique: BTreeSet<_> = self.columns.iter().collect();
        if unique.len() != self.columns.len() {
            return Err(invalid("column whitelist contains duplicates"));
        }
        if self.rolling_window == 0 {
            return Err(invalid("rolling window must be at least one day"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> crate::error::TrackerError {
    ConfigError::InvalidConfig(msg.to_string()).into()
}
