use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    error::TrackerResult,
    report::{
        insights::Insights, io::ToCsv, observations::ObservationTable, trends::CaseTrend,
    },
};

/// Paths written by [`export_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReports {
    pub cleaned: PathBuf,
    pub snapshot: PathBuf,
    pub trend: PathBuf,
    pub insights: PathBuf,
}

/// Writes the cleaned table, the latest snapshot, the new cases trend and
/// the insight record into `dir`, creating it if needed.
pub fn export_reports(
    dir: impl AsRef<Path>,
    table: &ObservationTable,
    trend: &CaseTrend,
    insights: &Insights,
) -> TrackerResult<ExportedReports> {
    let dir = dir.as_ref();
    let exported = ExportedReports {
        cleaned: table.to_csv(dir)?,
        snapshot: insights.latest_snapshot().to_csv(dir)?,
        trend: trend.to_csv(dir)?,
        insights: insights.to_json_file(dir)?,
    };

    info!(dir = %dir.display(), "Exported reports");
    Ok(exported)
}
