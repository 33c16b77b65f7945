use polars::prelude::{IntoLazy, col};
use tracing::info;

use crate::{
    data::schema::ObservationCol,
    error::TrackerResult,
    report::{
        io::Report,
        observations::ObservationTable,
        polars_ext::{DataFrameExt, ExprExt, polars_to_tracker_error},
    },
};

/// Adds `case_fatality_rate` and `vaccination_rate` to every row.
///
/// Both metrics are row-local percentages. A zero or unknown denominator, or
/// an unknown numerator, yields null rather than NaN or infinity.
pub fn derive_metrics(table: ObservationTable) -> TrackerResult<ObservationTable> {
    let df = table.as_df();
    df.require_columns(
        [
            ObservationCol::TotalDeaths,
            ObservationCol::TotalCases,
            ObservationCol::PeopleVaccinated,
            ObservationCol::Population,
        ]
        .map(|c| c.as_str()),
    )?;

    let derived = df
        .clone()
        .lazy()
        .with_columns([
            col(ObservationCol::TotalDeaths)
                .percent_of(col(ObservationCol::TotalCases))
                .alias(ObservationCol::CaseFatalityRate),
            col(ObservationCol::PeopleVaccinated)
                .percent_of(col(ObservationCol::Population))
                .alias(ObservationCol::VaccinationRate),
        ])
        .collect()
        .map_err(|e| polars_to_tracker_error("deriving metrics", e))?;

    let undefined_cfr = derived
        .column(ObservationCol::CaseFatalityRate.as_str())
        .map(|c| c.null_count())
        .unwrap_or_default();
    info!(
        rows = derived.height(),
        undefined_cfr, "Derived case fatality and vaccination rates"
    );

    Ok(ObservationTable::from_cleaned(derived))
}

#[cfg(test)]
mod tests {
    use polars::prelude::DataType;

    use crate::{
        error::{DataError, TrackerError},
        pipeline::{clean::clean, fixtures::frame},
    };

    use super::*;

    fn rates(table: &ObservationTable, metric: ObservationCol) -> Vec<Option<f64>> {
        table
            .as_df()
            .column(metric.as_str())
            .expect("metric column")
            .f64()
            .expect("f64 column")
            .into_iter()
            .collect()
    }

    #[test]
    fn test_case_fatality_rate_undefined_on_zero_cases() {
        let cleaned = clean(frame(&[
            ("Testland", "2021-01-01", Some(0.0), Some(0.0), None, None),
            ("Testland", "2021-01-02", Some(100.0), Some(2.0), None, None),
        ]))
        .expect("Failed to clean");

        let table = derive_metrics(cleaned).expect("Failed to derive");
        let cfr = rates(&table, ObservationCol::CaseFatalityRate);

        assert_eq!(cfr[0], None);
        let second = cfr[1].expect("defined rate");
        assert!((second - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_case_fatality_rate_undefined_exactly_when_cases_zero_or_unknown() {
        // Unknown cases are zero-filled by the cleaner, so both map to zero here.
        let cleaned = clean(frame(&[
            ("Aland", "2021-01-01", None, Some(1.0), None, None),
            ("Aland", "2021-01-02", Some(0.0), None, None, None),
            ("Aland", "2021-01-03", Some(50.0), None, None, None),
            ("Aland", "2021-01-04", Some(40.0), Some(3.0), None, None),
        ]))
        .expect("Failed to clean");

        let table = derive_metrics(cleaned).expect("Failed to derive");
        let cfr = rates(&table, ObservationCol::CaseFatalityRate);

        assert_eq!(cfr[0], None);
        assert_eq!(cfr[1], None);
        assert_eq!(cfr[2], Some(0.0));
        let fourth = cfr[3].expect("defined rate");
        assert!((fourth - 7.5).abs() < 1e-9);
        assert!(cfr.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_vaccination_rate() {
        let cleaned = clean(frame(&[
            ("Aland", "2021-01-01", Some(1.0), None, Some(250.0), Some(1000.0)),
            ("Aland", "2021-01-02", Some(1.0), None, None, Some(1000.0)),
            ("Aland", "2021-01-03", Some(1.0), None, Some(250.0), None),
            ("Aland", "2021-01-04", Some(1.0), None, Some(250.0), Some(0.0)),
        ]))
        .expect("Failed to clean");

        let table = derive_metrics(cleaned).expect("Failed to derive");
        let rate = rates(&table, ObservationCol::VaccinationRate);

        let first = rate[0].expect("defined rate");
        assert!((first - 25.0).abs() < 1e-9);
        assert_eq!(&rate[1..], &[None, None, None]);
        assert_eq!(
            table
                .as_df()
                .column(ObservationCol::VaccinationRate.as_str())
                .expect("rate column")
                .dtype(),
            &DataType::Float64
        );
    }

    #[test]
    fn test_missing_denominator_column_is_reported() {
        let df = frame(&[("Aland", "2021-01-01", Some(1.0), None, None, None)])
            .drop("population")
            .expect("Failed to drop column");
        let cleaned = clean(df).expect("Failed to clean");

        assert!(matches!(
            derive_metrics(cleaned),
            Err(TrackerError::Data(DataError::MissingColumn(ref name))) if name == "population"
        ));
    }
}
