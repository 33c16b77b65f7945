use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors related to the pipeline configuration (whitelists, paths, windows).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors related to the shape and content of the observation table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("Missing required column: '{0}'")]
    MissingColumn(String),

    #[error("No valid row to rank by '{metric}': every value is undefined")]
    NoValidRow { metric: String },

    #[error("Duplicate observation for entity '{location}' on {date}")]
    DuplicateObservation { location: String, date: String },

    #[error("Empty observation table: {0}")]
    EmptyTable(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),

    #[error("Failed date conversion: {0}")]
    TimestampConversion(String),
}

/// Errors related to reading the data source and writing exports.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Data source not found: '{0}'")]
    DataSourceNotFound(String),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Failed to create reader: {0}")]
    ReaderCreation(String),

    #[error("Failed to create writer: {0}")]
    WriterCreation(String),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),
}
