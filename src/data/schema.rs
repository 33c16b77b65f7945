use std::sync::Arc;

use chrono::NaiveDate;
use polars::prelude::{DataType, Field, PlSmallStr, Schema, SchemaRef};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Days between 0001-01-01 (CE) and 1970-01-01, the epoch of polars' `Date` physical type.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// The vocabulary of the working observation table.
///
/// One row per (entity, date). Source columns come straight from the OWID
/// dataset; derived columns are computed by the metric deriver.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ObservationCol {
    // ========================================================================
    // Keys
    // ========================================================================
    /// Observation day.
    Date,
    /// Entity identifier (country or region name, e.g. `Kenya`).
    Location,
    /// ISO 3166-1 alpha-3 code of the entity.
    IsoCode,

    // ========================================================================
    // Epidemiology
    // ========================================================================
    TotalCases,
    NewCases,
    TotalDeaths,
    NewDeaths,

    // ========================================================================
    // Vaccination
    // ========================================================================
    TotalVaccinations,
    PeopleVaccinated,
    PeopleFullyVaccinated,

    // ========================================================================
    // Demographics
    // ========================================================================
    Population,
    PopulationDensity,
    MedianAge,
    GdpPerCapita,

    // ========================================================================
    // Derived Metrics
    // ========================================================================
    /// `total_deaths / total_cases * 100`, null when undefined.
    CaseFatalityRate,
    /// `people_vaccinated / population * 100`, null when undefined.
    VaccinationRate,
}

impl From<ObservationCol> for PlSmallStr {
    fn from(value: ObservationCol) -> Self {
        value.as_str().into()
    }
}

impl From<&ObservationCol> for PlSmallStr {
    fn from(value: &ObservationCol) -> Self {
        value.as_str().into()
    }
}

impl ObservationCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::CaseFatalityRate | Self::VaccinationRate)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Date | Self::Location | Self::IsoCode)
    }

    /// Count fields whose unknown values are filled with zero during cleaning.
    pub fn is_zero_filled(&self) -> bool {
        matches!(
            self,
            Self::TotalCases | Self::NewCases | Self::TotalDeaths | Self::NewDeaths
        )
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Self::Date => DataType::Date,
            Self::Location | Self::IsoCode => DataType::String,
            _ => DataType::Float64,
        }
    }

    /// Source columns in the order the pipeline projects them by default.
    pub fn source_columns() -> impl Iterator<Item = ObservationCol> {
        Self::iter().filter(|c| !c.is_derived())
    }

    /// Canonical schema of the cleaned and derived table.
    pub fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = Self::iter()
            .map(|col| Field::new(col.into(), col.dtype()))
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

/// Converts the physical value of a polars `Date` (days since 1970-01-01).
pub(crate) fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_column_names_match_owid_headers() {
        assert_eq!(ObservationCol::IsoCode.as_str(), "iso_code");
        assert_eq!(ObservationCol::GdpPerCapita.as_str(), "gdp_per_capita");
        assert_eq!(
            ObservationCol::PeopleFullyVaccinated.as_str(),
            "people_fully_vaccinated"
        );
        assert_eq!(
            ObservationCol::from_str("case_fatality_rate").expect("known column"),
            ObservationCol::CaseFatalityRate
        );
    }

    #[test]
    fn test_source_columns_exclude_derived_metrics() {
        let source: Vec<_> = ObservationCol::source_columns().collect();
        assert_eq!(source.len(), 14);
        assert_eq!(source.first(), Some(&ObservationCol::Date));
        assert!(source.iter().all(|c| !c.is_derived()));
    }

    #[test]
    fn test_date_from_epoch_days() {
        assert_eq!(
            date_from_epoch_days(0),
            NaiveDate::from_ymd_opt(1970, 1, 1)
        );
        assert_eq!(
            date_from_epoch_days(18_628),
            NaiveDate::from_ymd_opt(2021, 1, 1)
        );
    }
}
