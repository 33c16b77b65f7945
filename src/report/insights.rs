use std::{
    cmp::Reverse,
    collections::BTreeMap,
    fmt,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use polars::{
    frame::DataFrame,
    prelude::{IntoLazy, col},
};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    data::schema::ObservationCol,
    error::{DataError, IoError, TrackerResult},
    report::{
        io::{FileExtension, Report, ReportName, ToJson, ensure_dir},
        observations::{LatestSnapshot, ObservationTable},
        polars_ext::polars_to_tracker_error,
    },
};

/// Literal used wherever an undefined value is displayed.
pub const UNDEFINED: &str = "undefined";

/// An entity together with the value that ranked it first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRate {
    pub location: String,
    pub rate: f64,
}

/// Key facts over a cleaned and derived [`ObservationTable`].
///
/// The two extremal insights are kept as independent results: an entity
/// ranking that fails with [`DataError::NoValidRow`] does not hide the
/// others.
#[derive(Debug, Clone)]
pub struct Insights {
    pub latest_date: NaiveDate,
    /// Sum over entities of each entity's maximum `total_cases`.
    pub total_cases: f64,
    /// Sum over entities of each entity's maximum `total_deaths`.
    pub total_deaths: f64,
    pub max_vaccination_rate: Result<EntityRate, DataError>,
    pub max_fatality_rate: Result<EntityRate, DataError>,
    /// Whole days between the first day with `total_cases > 0` and
    /// `latest_date`; `None` if the entity never reported a case.
    pub days_reporting: BTreeMap<String, Option<i64>>,
    latest_snapshot: LatestSnapshot,
}

impl Insights {
    /// Computes every insight. Performs no I/O.
    ///
    /// # Errors
    /// Fails only on an empty table or a structurally broken frame. Ranking
    /// failures are stored in their own fields instead.
    pub fn extract(table: &ObservationTable) -> TrackerResult<Self> {
        let latest_date = table.latest_date()?;
        let latest_day = table.latest_epoch_day()?;
        let latest_snapshot = table.latest_snapshot()?;
        let (total_cases, total_deaths) = cumulative_totals(table)?;

        let max_vaccination_rate = highest(&latest_snapshot, ObservationCol::VaccinationRate)?;
        let max_fatality_rate = highest(&latest_snapshot, ObservationCol::CaseFatalityRate)?;

        let days_reporting = days_reporting(table, latest_day)?;

        info!(
            latest_date = %latest_date,
            snapshot_rows = latest_snapshot.height(),
            entities = days_reporting.len(),
            "Extracted insights"
        );

        Ok(Self {
            latest_date,
            total_cases,
            total_deaths,
            max_vaccination_rate,
            max_fatality_rate,
            days_reporting,
            latest_snapshot,
        })
    }

    pub fn latest_snapshot(&self) -> &LatestSnapshot {
        &self.latest_snapshot
    }

    /// JSON rendering; failed rankings become `{"error": ...}` objects.
    pub fn to_json(&self) -> Value {
        let outcome = |r: &Result<EntityRate, DataError>| match r {
            Ok(rate) => json!(rate),
            Err(e) => json!({ "error": e.to_string() }),
        };

        json!({
            "latest_date": self.latest_date,
            "total_cases": self.total_cases,
            "total_deaths": self.total_deaths,
            "max_vaccination_rate": outcome(&self.max_vaccination_rate),
            "max_fatality_rate": outcome(&self.max_fatality_rate),
            "days_reporting": self.days_reporting,
        })
    }

    /// [`Insights::to_json`] with the latest snapshot rows under `latest_snapshot`.
    pub fn to_record(&self) -> TrackerResult<Value> {
        let mut record = self.to_json();
        if let Value::Object(map) = &mut record {
            map.insert(
                "latest_snapshot".to_string(),
                self.latest_snapshot.to_json()?,
            );
        }
        Ok(record)
    }

    /// Writes [`Insights::to_record`] to `<dir>/covid_insights.json` and returns the file path.
    pub fn to_json_file(&self, dir: impl AsRef<Path>) -> TrackerResult<PathBuf> {
        let dir = dir.as_ref();
        ensure_dir(dir)?;

        let file_path = dir.join(self.filename(FileExtension::Json));
        let file = File::create(&file_path).map_err(|e| {
            IoError::WriterCreation(format!("{}: {e}", file_path.display()))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_record()?)
            .map_err(IoError::Json)?;

        info!(path = %file_path.display(), "Exported insights");
        Ok(file_path)
    }
}

impl ReportName for Insights {
    fn base_name(&self) -> String {
        "covid_insights".to_string()
    }
}

impl fmt::Display for Insights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key Insights as of {}:", self.latest_date.format("%B %d, %Y"))?;
        writeln!(
            f,
            "1. Total cases across analyzed countries: {:.1} million",
            self.total_cases / 1e6
        )?;
        writeln!(
            f,
            "2. Total deaths across analyzed countries: {:.1} thousand",
            self.total_deaths / 1e3
        )?;

        match &self.max_vaccination_rate {
            Ok(r) => writeln!(
                f,
                "3. {} has the highest vaccination rate at {:.1}%",
                r.location, r.rate
            )?,
            Err(e) => writeln!(f, "3. Highest vaccination rate: {UNDEFINED} ({e})")?,
        }
        match &self.max_fatality_rate {
            Ok(r) => writeln!(
                f,
                "4. {} has the highest case fatality rate at {:.1}%",
                r.location, r.rate
            )?,
            Err(e) => writeln!(f, "4. Highest case fatality rate: {UNDEFINED} ({e})")?,
        }

        for (entity, days) in &self.days_reporting {
            match days {
                Some(days) => writeln!(f, "5. {entity} has been reporting cases for {days} days")?,
                None => writeln!(f, "5. {entity} has been reporting cases for {UNDEFINED} days")?,
            }
        }
        Ok(())
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn cumulative_totals(table: &ObservationTable) -> TrackerResult<(f64, f64)> {
    let totals = table
        .as_df()
        .clone()
        .lazy()
        .group_by([col(ObservationCol::Location)])
        .agg([
            col(ObservationCol::TotalCases).max(),
            col(ObservationCol::TotalDeaths).max(),
        ])
        .select([
            col(ObservationCol::TotalCases).sum(),
            col(ObservationCol::TotalDeaths).sum(),
        ])
        .collect()
        .map_err(|e| polars_to_tracker_error("aggregating cumulative totals", e))?;

    let scalar = |c: ObservationCol| -> TrackerResult<f64> {
        Ok(totals
            .column(c.as_str())
            .and_then(|s| s.f64().map(|ca| ca.get(0)))
            .map_err(|e| polars_to_tracker_error("reading cumulative totals", e))?
            .unwrap_or(0.0))
    };

    Ok((
        scalar(ObservationCol::TotalCases)?,
        scalar(ObservationCol::TotalDeaths)?,
    ))
}

/// Ranks the snapshot by `metric`, ignoring undefined values.
///
/// Ties resolve to the first entity in table order.
fn highest(
    snapshot: &LatestSnapshot,
    metric: ObservationCol,
) -> TrackerResult<Result<EntityRate, DataError>> {
    let best = snapshot
        .metric(metric)?
        .into_iter()
        .filter_map(|(location, value)| {
            value
                .filter(|v| v.is_finite())
                .map(|rate| EntityRate { location, rate })
        })
        .min_by_key(|r| Reverse(OrderedFloat(r.rate)));

    Ok(best.ok_or_else(|| DataError::NoValidRow {
        metric: metric.as_str().to_string(),
    }))
}

fn days_reporting(
    table: &ObservationTable,
    latest_day: i32,
) -> TrackerResult<BTreeMap<String, Option<i64>>> {
    let partitions = table
        .as_df()
        .partition_by_stable([ObservationCol::Location], true)
        .map_err(|e| polars_to_tracker_error("partitioning by entity", e))?;

    partitions
        .into_par_iter()
        .map(|part| -> TrackerResult<(String, Option<i64>)> {
            let (entity, first_day) = first_reporting_day(&part)?;
            let days = first_day.map(|first| i64::from(latest_day) - i64::from(first));
            debug!(entity = %entity, ?days, "Days reporting");
            Ok((entity, days))
        })
        .collect()
}

/// Entity name and earliest day (since epoch) with `total_cases > 0`.
fn first_reporting_day(part: &DataFrame) -> TrackerResult<(String, Option<i32>)> {
    let stage = "scanning an entity's history";
    let entity = part
        .column(ObservationCol::Location.as_str())
        .and_then(|c| c.str().map(|ca| ca.get(0).map(str::to_string)))
        .map_err(|e| polars_to_tracker_error(stage, e))?
        .ok_or_else(|| DataError::EmptyTable("entity partition without location".to_string()))?;

    let cases = part
        .column(ObservationCol::TotalCases.as_str())
        .and_then(|c| c.f64().cloned())
        .map_err(|e| polars_to_tracker_error(stage, e))?;
    let dates = part
        .column(ObservationCol::Date.as_str())
        .and_then(|c| c.date().map(|ca| ca.physical().clone()))
        .map_err(|e| polars_to_tracker_error(stage, e))?;

    let first = cases
        .into_iter()
        .zip(&dates)
        .filter_map(|(cases, day)| match (cases, day) {
            (Some(c), Some(d)) if c > 0.0 => Some(d),
            _ => None,
        })
        .min();

    Ok((entity, first))
}
