use std::{collections::BTreeMap, str::FromStr};

use polars::{
    frame::DataFrame,
    prelude::{
        DataType, Expr, FillNullStrategy, IntoLazy, SortMultipleOptions, StrptimeOptions, col, len, lit,
    },
};
use tracing::{info, warn};

use crate::{
    data::schema::ObservationCol,
    error::{DataError, TrackerResult},
    report::{
        io::Report,
        observations::ObservationTable,
        polars_ext::{DataFrameExt, polars_to_tracker_error},
    },
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DUPLICATE_COUNT: &str = "__duplicates";
const REGRESSIONS: &str = "__regressions";

/// Normalizes a filtered frame into the working [`ObservationTable`].
///
/// - `date` becomes a `Date` column (parsed from `%Y-%m-%d` strings if needed).
/// - Unknown `total_cases`, `new_cases`, `total_deaths` and `new_deaths` become 0.
/// - Every other known numeric column is cast to `Float64`; nulls stay null.
/// - Rows are sorted by (`location`, `date`) ascending.
///
/// No row is added or removed. Two rows for the same entity and day fail
/// with [`DataError::DuplicateObservation`]. Decreasing cumulative counts are
/// tolerated and reported through `warn!`.
pub fn clean(df: DataFrame) -> TrackerResult<ObservationTable> {
    df.require_columns(
        [
            ObservationCol::Location,
            ObservationCol::Date,
            ObservationCol::TotalCases,
            ObservationCol::NewCases,
            ObservationCol::TotalDeaths,
            ObservationCol::NewDeaths,
        ]
        .map(|c| c.as_str()),
    )?;

    let mut normalized = vec![date_expr(&df)?];
    normalized.extend(numeric_exprs(&df));

    let rows = df.height();
    let sorted = df
        .lazy()
        .with_columns(normalized)
        .sort(
            [ObservationCol::Location, ObservationCol::Date],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()
        .map_err(|e| polars_to_tracker_error("cleaning observations", e))?;

    ensure_unique_observations(&sorted)?;

    // Checked before zero-filling so unknown values are skipped, not read as 0.
    for (entity, regressions) in cumulative_regressions(&sorted)? {
        warn!(
            entity = %entity,
            regressions,
            "Cumulative counts decrease between consecutive observations"
        );
    }

    let cleaned = sorted
        .lazy()
        .with_columns(zero_fill_exprs())
        .collect()
        .map_err(|e| polars_to_tracker_error("zero-filling count fields", e))?;

    info!(rows, "Cleaned observations");
    Ok(ObservationTable::from_cleaned(cleaned))
}

/// Per entity, the number of rows whose `total_cases` or `total_deaths` is
/// lower than the entity's previous known value. Entities without any
/// regression are omitted.
///
/// Expects rows sorted by date within each entity, with unknown counts
/// still null. Unknown values never count as a regression.
pub fn cumulative_regressions(df: &DataFrame) -> TrackerResult<BTreeMap<String, u32>> {
    df.require_columns(
        [
            ObservationCol::Location,
            ObservationCol::TotalCases,
            ObservationCol::TotalDeaths,
        ]
        .map(|c| c.as_str()),
    )?;

    let decreased = |c: ObservationCol| {
        let previous_known = col(c)
            .fill_null_with_strategy(FillNullStrategy::Forward(None))
            .shift(lit(1))
            .over([col(ObservationCol::Location)]);
        col(c).lt(previous_known).fill_null(lit(false))
    };

    let out = df
        .clone()
        .lazy()
        .select([
            col(ObservationCol::Location),
            decreased(ObservationCol::TotalCases)
                .or(decreased(ObservationCol::TotalDeaths))
                .alias(REGRESSIONS),
        ])
        .group_by([col(ObservationCol::Location)])
        .agg([col(REGRESSIONS)
            .cast(DataType::UInt32)
            .sum()
            .cast(DataType::UInt32)])
        .filter(col(REGRESSIONS).gt(lit(0)))
        .collect()
        .map_err(|e| polars_to_tracker_error("checking cumulative counts", e))?;

    let stage = "reading cumulative regressions";
    let locations = out
        .column(ObservationCol::Location.as_str())
        .and_then(|c| c.str().cloned())
        .map_err(|e| polars_to_tracker_error(stage, e))?;
    let counts = out
        .column(REGRESSIONS)
        .and_then(|c| c.u32().cloned())
        .map_err(|e| polars_to_tracker_error(stage, e))?;

    Ok(locations
        .into_iter()
        .zip(&counts)
        .filter_map(|(location, count)| Some((location?.to_string(), count?)))
        .collect())
}

fn date_expr(df: &DataFrame) -> TrackerResult<Expr> {
    let date = ObservationCol::Date;
    let dtype = df
        .column(date.as_str())
        .map_err(|e| polars_to_tracker_error("reading the date column", e))?
        .dtype()
        .clone();

    match dtype {
        DataType::Date => Ok(col(date)),
        DataType::Datetime(_, _) => Ok(col(date).cast(DataType::Date).alias(date)),
        DataType::String => Ok(col(date)
            .str()
            .to_date(StrptimeOptions {
                format: Some(DATE_FORMAT.into()),
                strict: true,
                ..Default::default()
            })
            .alias(date)),
        other => Err(DataError::TimestampConversion(format!(
            "column '{date}' has unsupported type {other}"
        ))
        .into()),
    }
}

/// Casts known numeric columns to `Float64`.
///
/// Columns outside the observation vocabulary are passed through untouched.
fn numeric_exprs(df: &DataFrame) -> Vec<Expr> {
    df.get_column_names()
        .into_iter()
        .filter_map(|name| ObservationCol::from_str(name.as_str()).ok())
        .filter(ObservationCol::is_numeric)
        .map(|c| col(c).cast(DataType::Float64).alias(c))
        .collect()
}

/// The four count fields are required, so they are always present here.
fn zero_fill_exprs() -> Vec<Expr> {
    ObservationCol::source_columns()
        .filter(ObservationCol::is_zero_filled)
        .map(|c| col(c).fill_null(lit(0.0)).alias(c))
        .collect()
}

fn ensure_unique_observations(df: &DataFrame) -> TrackerResult<()> {
    let duplicates = df
        .clone()
        .lazy()
        .group_by([col(ObservationCol::Location), col(ObservationCol::Date)])
        .agg([len().alias(DUPLICATE_COUNT)])
        .filter(col(DUPLICATE_COUNT).gt(lit(1)))
        .sort(
            [ObservationCol::Location, ObservationCol::Date],
            SortMultipleOptions::default(),
        )
        .limit(1)
        .select([
            col(ObservationCol::Location),
            col(ObservationCol::Date).cast(DataType::String),
        ])
        .collect()
        .map_err(|e| polars_to_tracker_error("checking observation uniqueness", e))?;

    if duplicates.height() == 0 {
        return Ok(());
    }

    let first_str = |c: ObservationCol| -> String {
        duplicates
            .column(c.as_str())
            .ok()
            .and_then(|s| s.str().ok())
            .and_then(|s| s.get(0))
            .unwrap_or_default()
            .to_string()
    };

    Err(DataError::DuplicateObservation {
        location: first_str(ObservationCol::Location),
        date: first_str(ObservationCol::Date),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use polars::df;

    use crate::{error::TrackerError, pipeline::fixtures::frame};

    use super::*;

    #[test]
    fn test_count_fields_never_unknown_after_cleaning() {
        let table = clean(frame(&[
            ("Kenya", "2021-01-02", None, None, None, Some(1000.0)),
            ("Kenya", "2021-01-01", Some(3.0), None, None, None),
        ]))
        .expect("Failed to clean");

        for c in [
            ObservationCol::TotalCases,
            ObservationCol::NewCases,
            ObservationCol::TotalDeaths,
            ObservationCol::NewDeaths,
        ] {
            let column = table.as_df().column(c.as_str()).expect("count column");
            assert_eq!(column.null_count(), 0, "column '{c}' has nulls");
            assert_eq!(column.dtype(), &DataType::Float64);
        }
    }

    #[test]
    fn test_other_numeric_fields_keep_unknowns() {
        let table = clean(frame(&[
            ("Kenya", "2021-01-01", Some(3.0), None, None, None),
            ("Kenya", "2021-01-02", Some(3.0), None, Some(10.0), Some(1000.0)),
        ]))
        .expect("Failed to clean");

        let population = table
            .as_df()
            .column(ObservationCol::Population.as_str())
            .expect("population column");
        assert_eq!(population.null_count(), 1);
    }

    #[test]
    fn test_sorted_by_entity_then_date() {
        let table = clean(frame(&[
            ("Kenya", "2021-01-02", Some(1.0), None, None, None),
            ("Germany", "2021-01-03", Some(1.0), None, None, None),
            ("Kenya", "2021-01-01", Some(1.0), None, None, None),
            ("Germany", "2021-01-01", Some(1.0), None, None, None),
        ]))
        .expect("Failed to clean");

        let df = table.as_df();
        let locations: Vec<_> = df
            .column("location")
            .expect("location")
            .str()
            .expect("str")
            .into_iter()
            .map(|l| l.unwrap_or_default().to_string())
            .collect();
        let dates: Vec<_> = df
            .column("date")
            .expect("date")
            .date()
            .expect("date dtype")
            .physical()
            .into_iter()
            .map(|d| d.unwrap_or_default())
            .collect();

        assert_eq!(locations, vec!["Germany", "Germany", "Kenya", "Kenya"]);
        let keys: Vec<_> = locations.iter().zip(dates.iter()).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys not strictly ascending");
    }

    #[test]
    fn test_normalizes_string_and_native_dates() {
        let from_str = clean(frame(&[("Kenya", "2021-01-01", None, None, None, None)]))
            .expect("Failed to clean string dates");
        assert_eq!(
            from_str.as_df().column("date").expect("date").dtype(),
            &DataType::Date
        );

        let native = from_str
            .as_df()
            .clone()
            .lazy()
            .with_column(col("date").cast(DataType::Datetime(
                polars::prelude::TimeUnit::Milliseconds,
                None,
            )))
            .collect()
            .expect("Failed to cast to datetime");
        let from_datetime = clean(native).expect("Failed to clean datetime dates");
        assert_eq!(
            from_datetime.as_df().column("date").expect("date").dtype(),
            &DataType::Date
        );
    }

    #[test]
    fn test_unparseable_date_type_is_rejected() {
        let df = df![
            "location" => &["Kenya"],
            "date" => &[true],
            "total_cases" => &[1.0],
            "new_cases" => &[1.0],
            "total_deaths" => &[0.0],
            "new_deaths" => &[0.0],
        ]
        .expect("Failed to create DF");

        assert!(matches!(
            clean(df),
            Err(TrackerError::Data(DataError::TimestampConversion(_)))
        ));
    }

    #[test]
    fn test_duplicate_entity_date_is_rejected() {
        let result = clean(frame(&[
            ("Kenya", "2021-01-01", Some(1.0), None, None, None),
            ("Kenya", "2021-01-01", Some(2.0), None, None, None),
        ]));

        match result {
            Err(TrackerError::Data(DataError::DuplicateObservation { location, date })) => {
                assert_eq!(location, "Kenya");
                assert_eq!(date, "2021-01-01");
            }
            other => panic!("Expected DuplicateObservation, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_count_column_is_reported() {
        let df = df![
            "location" => &["Kenya"],
            "date" => &["2021-01-01"],
            "total_cases" => &[1.0],
        ]
        .expect("Failed to create DF");

        assert!(matches!(
            clean(df),
            Err(TrackerError::Data(DataError::MissingColumn(ref name))) if name == "new_cases"
        ));
    }

    #[test]
    fn test_cumulative_regressions_are_counted_not_rejected() {
        let rows = [
            ("Kenya", "2021-01-01", Some(10.0), Some(1.0), None, None),
            ("Kenya", "2021-01-02", Some(8.0), Some(1.0), None, None),
            ("Kenya", "2021-01-03", Some(12.0), Some(0.0), None, None),
            ("Germany", "2021-01-01", Some(5.0), Some(0.0), None, None),
            ("Germany", "2021-01-02", Some(6.0), Some(0.0), None, None),
        ];
        let table = clean(frame(&rows)).expect("Non-monotonic input must be tolerated");

        let regressions =
            cumulative_regressions(&frame(&rows)).expect("Failed to count regressions");

        assert_eq!(regressions, BTreeMap::from([("Kenya".to_string(), 2)]));
        assert_eq!(table.height(), 5);
    }

    #[test]
    fn test_unknown_counts_between_known_values_are_not_regressions() {
        let rows = [
            ("Kenya", "2021-01-01", Some(100.0), Some(3.0), None, None),
            ("Kenya", "2021-01-02", None, None, None, None),
            ("Kenya", "2021-01-03", Some(110.0), Some(3.0), None, None),
            ("Kenya", "2021-01-04", None, Some(4.0), None, None),
            ("Kenya", "2021-01-05", Some(90.0), Some(4.0), None, None),
        ];

        let regressions =
            cumulative_regressions(&frame(&rows)).expect("Failed to count regressions");

        // Only 90 after the last known 110 is a decrease.
        assert_eq!(regressions, BTreeMap::from([("Kenya".to_string(), 1)]));

        let table = clean(frame(&rows)).expect("Failed to clean");
        let cases: Vec<Option<f64>> = table
            .as_df()
            .column(ObservationCol::TotalCases.as_str())
            .expect("total_cases")
            .f64()
            .expect("f64 column")
            .into_iter()
            .collect();
        assert_eq!(
            cases,
            vec![Some(100.0), Some(0.0), Some(110.0), Some(0.0), Some(90.0)]
        );
    }

    #[test]
    fn test_gap_only_history_has_no_regressions() {
        let regressions = cumulative_regressions(&frame(&[
            ("Kenya", "2021-01-01", Some(100.0), None, None, None),
            ("Kenya", "2021-01-02", None, None, None, None),
            ("Kenya", "2021-01-03", Some(110.0), None, None, None),
        ]))
        .expect("Failed to count regressions");

        assert!(regressions.is_empty(), "unexpected regressions: {regressions:?}");
    }
}
