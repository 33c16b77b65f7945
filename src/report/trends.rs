use std::sync::Arc;

use polars::{
    frame::DataFrame,
    prelude::{DataType, Field, IntoLazy, RollingOptionsFixedWindow, Schema, SchemaRef, col},
};
use tracing::debug;

use crate::{
    data::schema::ObservationCol,
    error::TrackerResult,
    report::{
        io::{Report, ReportName, ToSchema},
        observations::ObservationTable,
        polars_ext::{DataFrameExt, polars_to_tracker_error},
    },
};

/// Name of the moving-average column.
pub const NEW_CASES_ROLLING_MEAN: &str = "new_cases_rolling_mean";

const SERIES_COLUMNS: [ObservationCol; 5] = [
    ObservationCol::Location,
    ObservationCol::Date,
    ObservationCol::TotalCases,
    ObservationCol::NewCases,
    ObservationCol::VaccinationRate,
];

/// Per-entity time series feeding the trend charts: cumulative cases,
/// the moving average of new cases and the vaccination rate over time.
#[derive(Debug, Clone)]
pub struct CaseTrend {
    df: DataFrame,
    window: u16,
}

impl Report for CaseTrend {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ReportName for CaseTrend {
    fn base_name(&self) -> String {
        "new_cases_trend".to_string()
    }
}

impl ToSchema for CaseTrend {
    fn to_schema() -> SchemaRef {
        let mut fields: Vec<Field> = SERIES_COLUMNS
            .iter()
            .map(|c| Field::new(c.into(), c.dtype()))
            .collect();
        fields.push(Field::new(NEW_CASES_ROLLING_MEAN.into(), DataType::Float64));
        Arc::new(Schema::from_iter(fields))
    }
}

impl CaseTrend {
    /// Computes the trailing moving average of `new_cases` per entity.
    ///
    /// The window counts rows, one per day, and must be full: the first
    /// `window - 1` observations of each entity have no average (null).
    /// Windows never span two entities.
    pub fn from_table(table: &ObservationTable, window: u16) -> TrackerResult<Self> {
        table
            .as_df()
            .require_columns(SERIES_COLUMNS.map(|c| c.as_str()))?;

        let options = RollingOptionsFixedWindow {
            window_size: window as usize,
            min_periods: window as usize,
            weights: None,
            center: false,
            fn_params: None,
        };

        let df = table
            .as_df()
            .clone()
            .lazy()
            .select([
                col(ObservationCol::Location),
                col(ObservationCol::Date),
                col(ObservationCol::TotalCases),
                col(ObservationCol::NewCases),
                col(ObservationCol::VaccinationRate),
                col(ObservationCol::NewCases)
                    .rolling_mean(options)
                    .over([col(ObservationCol::Location)])
                    .alias(NEW_CASES_ROLLING_MEAN),
            ])
            .collect()
            .map_err(|e| polars_to_tracker_error("computing the new cases trend", e))?;

        debug!(window, rows = df.height(), "Computed new cases trend");
        Ok(Self { df, window })
    }

    pub fn window(&self) -> u16 {
        self.window
    }
}
