//! The cleaning and derived-metrics pipeline.
//!
//! Each stage is a pure function from an input table to a new output table:
//! [`filter_project`] → [`clean`] → [`derive_metrics`].

pub mod clean;
pub mod derive;
pub mod filter;

use std::time::Instant;

use polars::frame::DataFrame;
use tracing::info;

pub use clean::{clean, cumulative_regressions};
pub use derive::derive_metrics;
pub use filter::filter_project;

use crate::{
    config::TrackerConfig, data::loader::RawObservations, error::TrackerResult,
    report::observations::ObservationTable,
};

/// Runs filter/project, cleaning and metric derivation with the configured whitelists.
pub fn prepare(raw: &RawObservations, config: &TrackerConfig) -> TrackerResult<ObservationTable> {
    let start = Instant::now();
    let projected = filter_project(raw, &config.entities, &config.columns)?;
    let table = prepare_frame(projected)?;
    info!(
        rows = table.height(),
        elapsed = %humantime::format_duration(start.elapsed()),
        "Prepared observation table"
    );
    Ok(table)
}

/// Cleans and derives metrics on an already filtered frame.
pub fn prepare_frame(df: DataFrame) -> TrackerResult<ObservationTable> {
    derive_metrics(clean(df)?)
}
