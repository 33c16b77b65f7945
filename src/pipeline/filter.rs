use std::collections::BTreeSet;

use polars::{
    frame::DataFrame,
    prelude::{Expr, IntoLazy, col, lit},
};
use tracing::info;

use crate::{
    data::{loader::RawObservations, schema::ObservationCol},
    error::TrackerResult,
    report::polars_ext::{DataFrameExt, polars_to_tracker_error},
};

/// Keeps the rows whose `location` is in `entities` and exactly `columns`, in order.
///
/// Every requested column is checked before anything is projected, so a
/// whitelist naming an absent column fails with
/// [`DataError::MissingColumn`](crate::error::DataError::MissingColumn)
/// instead of being dropped. Row order of the output is unspecified.
pub fn filter_project(
    raw: &RawObservations,
    entities: &BTreeSet<String>,
    columns: &[String],
) -> TrackerResult<DataFrame> {
    let df = raw.as_df();
    df.require_columns([ObservationCol::Location.as_str()])?;
    df.require_columns(columns)?;

    let projection: Vec<Expr> = columns.iter().map(|c| col(c.as_str())).collect();

    let out = df
        .clone()
        .lazy()
        .filter(entity_predicate(entities))
        .select(projection)
        .collect()
        .map_err(|e| polars_to_tracker_error("filtering entities", e))?;

    info!(
        entities = entities.len(),
        rows_in = df.height(),
        rows_out = out.height(),
        columns = out.width(),
        "Filtered and projected observations"
    );
    Ok(out)
}

fn entity_predicate(entities: &BTreeSet<String>) -> Expr {
    entities
        .iter()
        .map(|entity| col(ObservationCol::Location).eq(lit(entity.as_str())))
        .reduce(|acc, e| acc.or(e))
        .unwrap_or_else(|| lit(false))
}

#[cfg(test)]
mod tests {
    use polars::df;

    use crate::error::{DataError, TrackerError};

    use super::*;

    fn raw() -> RawObservations {
        let df = df![
            "iso_code" => &["DEU", "KEN", "OWID_WRL", "KEN"],
            "location" => &["Germany", "Kenya", "World", "Kenya"],
            "date" => &["2021-01-01", "2021-01-01", "2021-01-01", "2021-01-02"],
            "total_cases" => &[Some(100.0), None, Some(1000.0), Some(5.0)],
            "continent" => &[Some("Europe"), Some("Africa"), None, Some("Africa")],
        ]
        .expect("Failed to create raw DF");
        RawObservations::new(df)
    }

    fn set(entities: &[&str]) -> BTreeSet<String> {
        entities.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_keeps_only_whitelisted_entities() {
        let columns = ["location".to_string(), "date".to_string()];
        let out = filter_project(&raw(), &set(&["Kenya", "Atlantis"]), &columns)
            .expect("Failed to filter");

        assert_eq!(out.height(), 2);
        let locations: Vec<_> = out
            .column("location")
            .expect("location column")
            .str()
            .expect("string column")
            .into_iter()
            .collect();
        assert!(locations.iter().all(|l| *l == Some("Kenya")));
    }

    #[test]
    fn test_projects_columns_in_requested_order() {
        let columns = [
            "total_cases".to_string(),
            "location".to_string(),
            "date".to_string(),
        ];
        let out = filter_project(&raw(), &set(&["Germany"]), &columns).expect("Failed to filter");

        let names: Vec<_> = out
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, columns.to_vec());
    }

    #[test]
    fn test_absent_column_is_configuration_error() {
        let columns = ["location".to_string(), "population".to_string()];
        let result = filter_project(&raw(), &set(&["Germany"]), &columns);

        assert!(matches!(
            result,
            Err(TrackerError::Data(DataError::MissingColumn(ref name))) if name == "population"
        ));
    }

    #[test]
    fn test_empty_whitelist_keeps_no_rows() {
        let columns = ["location".to_string()];
        let out = filter_project(&raw(), &BTreeSet::new(), &columns).expect("Failed to filter");
        assert_eq!(out.height(), 0);
    }
}
