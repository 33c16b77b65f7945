use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{ChunkAgg, DataType, IntoLazy, SchemaRef, col, lit},
};

use crate::{
    data::schema::{ObservationCol, date_from_epoch_days},
    error::{DataError, TrackerResult},
    report::{
        io::{Report, ReportName, ToSchema},
        polars_ext::polars_to_tracker_error,
    },
};

/// The cleaned working table: one row per (entity, date), sorted by
/// (entity ascending, date ascending).
///
/// Only the cleaner and the metric deriver construct it, so the ordering and
/// the non-null count fields can be relied upon by every reader.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    df: DataFrame,
}

impl Report for ObservationTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ReportName for ObservationTable {
    fn base_name(&self) -> String {
        "covid_cleaned_data".to_string()
    }
}

impl ToSchema for ObservationTable {
    fn to_schema() -> SchemaRef {
        ObservationCol::to_schema()
    }
}

impl ObservationTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Distinct entities in table order.
    pub fn entities(&self) -> TrackerResult<Vec<String>> {
        let locations = self
            .df
            .column(ObservationCol::Location.as_str())
            .and_then(|c| c.str().cloned())
            .map_err(|e| polars_to_tracker_error("reading entities", e))?;

        let mut entities: Vec<String> = Vec::new();
        for location in locations.into_iter().flatten() {
            if entities.last().map(String::as_str) != Some(location) {
                entities.push(location.to_string());
            }
        }
        Ok(entities)
    }

    /// Maximum date present across all rows, as days since 1970-01-01.
    pub(crate) fn latest_epoch_day(&self) -> TrackerResult<i32> {
        self.df
            .column(ObservationCol::Date.as_str())
            .and_then(|c| c.date().map(|ca| ca.physical().max()))
            .map_err(|e| polars_to_tracker_error("finding the latest date", e))?
            .ok_or_else(|| {
                DataError::EmptyTable("no dated observation to take a maximum over".to_string())
                    .into()
            })
    }

    pub fn latest_date(&self) -> TrackerResult<NaiveDate> {
        let days = self.latest_epoch_day()?;
        date_from_epoch_days(days).ok_or_else(|| {
            DataError::TimestampConversion(format!("{days} days since epoch is out of range"))
                .into()
        })
    }

    /// Rows dated on the latest date present in the table.
    pub fn latest_snapshot(&self) -> TrackerResult<LatestSnapshot> {
        let latest = self.latest_epoch_day()?;
        let df = self
            .df
            .clone()
            .lazy()
            .filter(
                col(ObservationCol::Date)
                    .cast(DataType::Int32)
                    .eq(lit(latest)),
            )
            .collect()
            .map_err(|e| polars_to_tracker_error("selecting the latest snapshot", e))?;

        Ok(LatestSnapshot { df })
    }
}

impl ObservationTable {
    /// Wraps a frame already sorted by (entity, date) with filled count fields.
    pub(crate) fn from_cleaned(df: DataFrame) -> Self {
        Self { df }
    }
}

/// Subset of the working table restricted to the maximum date present.
#[derive(Debug, Clone)]
pub struct LatestSnapshot {
    df: DataFrame,
}

impl Report for LatestSnapshot {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ReportName for LatestSnapshot {
    fn base_name(&self) -> String {
        "covid_latest_snapshot".to_string()
    }
}

impl ToSchema for LatestSnapshot {
    fn to_schema() -> SchemaRef {
        ObservationCol::to_schema()
    }
}

impl LatestSnapshot {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// `(entity, value)` pairs of a numeric column, undefined values as `None`.
    pub fn metric(&self, metric: ObservationCol) -> TrackerResult<Vec<(String, Option<f64>)>> {
        let stage = format!("reading '{metric}' from the latest snapshot");
        let locations = self
            .df
            .column(ObservationCol::Location.as_str())
            .and_then(|c| c.str().cloned())
            .map_err(|e| polars_to_tracker_error(&stage, e))?;
        let values = self
            .df
            .column(metric.as_str())
            .map_err(|_| DataError::MissingColumn(metric.as_str().to_string()))?
            .f64()
            .cloned()
            .map_err(|e| polars_to_tracker_error(&stage, e))?;

        Ok(locations
            .into_iter()
            .zip(&values)
            .filter_map(|(location, value)| location.map(|l| (l.to_string(), value)))
            .collect())
    }
}
