use std::sync::Arc;

use polars::{
    df,
    frame::DataFrame,
    prelude::{DataType, Expr, Field, IntoLazy, QuantileMethod, Schema, SchemaRef, col, lit},
};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    error::TrackerResult,
    report::{
        io::{Report, ReportName, ToSchema},
        observations::ObservationTable,
        polars_ext::polars_to_tracker_error,
    },
};

/// Descriptive statistics over every `Float64` column of the working table.
///
/// Unknown values are excluded from every statistic, so `count` is the
/// number of known observations. Quartiles interpolate linearly.
#[derive(Debug, Clone)]
pub struct SummaryStatistics {
    df: DataFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SummaryCol {
    Column,
    Count,
    Mean,
    Std,
    Min,
    #[strum(serialize = "25%")]
    Q25,
    #[strum(serialize = "50%")]
    Median,
    #[strum(serialize = "75%")]
    Q75,
    Max,
}

impl SummaryCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    fn stat_expr(&self, column: &str) -> Option<Expr> {
        let c = col(column);
        let expr = match self {
            Self::Column => return None,
            Self::Count => c.count(),
            Self::Mean => c.mean(),
            Self::Std => c.std(1),
            Self::Min => c.min(),
            Self::Q25 => c.quantile(lit(0.25), QuantileMethod::Linear),
            Self::Median => c.quantile(lit(0.5), QuantileMethod::Linear),
            Self::Q75 => c.quantile(lit(0.75), QuantileMethod::Linear),
            Self::Max => c.max(),
        };
        Some(
            expr.cast(DataType::Float64)
                .alias(format!("{column}__{self}")),
        )
    }
}

impl Report for SummaryStatistics {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl ReportName for SummaryStatistics {
    fn base_name(&self) -> String {
        "summary_statistics".to_string()
    }
}

impl ToSchema for SummaryStatistics {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = SummaryCol::iter()
            .map(|c| {
                let dtype = match c {
                    SummaryCol::Column => DataType::String,
                    _ => DataType::Float64,
                };
                Field::new(c.as_str().into(), dtype)
            })
            .collect();
        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&ObservationTable> for SummaryStatistics {
    type Error = crate::error::TrackerError;

    fn try_from(table: &ObservationTable) -> TrackerResult<Self> {
        let numeric: Vec<String> = table
            .as_df()
            .get_columns()
            .iter()
            .filter(|c| c.dtype() == &DataType::Float64)
            .map(|c| c.name().to_string())
            .collect();

        let exprs: Vec<Expr> = numeric
            .iter()
            .flat_map(|name| SummaryCol::iter().filter_map(move |s| s.stat_expr(name)))
            .collect();

        let stats = if exprs.is_empty() {
            DataFrame::empty()
        } else {
            table
                .as_df()
                .clone()
                .lazy()
                .select(exprs)
                .collect()
                .map_err(|e| polars_to_tracker_error("computing summary statistics", e))?
        };

        let stat = |name: &str, s: SummaryCol| -> Option<f64> {
            stats
                .column(&format!("{name}__{s}"))
                .ok()
                .and_then(|c| c.f64().ok())
                .and_then(|ca| ca.get(0))
        };
        let series = |s: SummaryCol| -> Vec<Option<f64>> {
            numeric.iter().map(|name| stat(name, s)).collect()
        };

        let df = df![
            SummaryCol::Column.as_str() => numeric.clone(),
            SummaryCol::Count.as_str() => series(SummaryCol::Count),
            SummaryCol::Mean.as_str() => series(SummaryCol::Mean),
            SummaryCol::Std.as_str() => series(SummaryCol::Std),
            SummaryCol::Min.as_str() => series(SummaryCol::Min),
            SummaryCol::Q25.as_str() => series(SummaryCol::Q25),
            SummaryCol::Median.as_str() => series(SummaryCol::Median),
            SummaryCol::Q75.as_str() => series(SummaryCol::Q75),
            SummaryCol::Max.as_str() => series(SummaryCol::Max),
        ]
        .map_err(|e| polars_to_tracker_error("assembling summary statistics", e))?;

        Ok(Self { df })
    }
}

impl SummaryStatistics {
    /// Statistic `stat` of `column`, if the column was summarized and the value is defined.
    pub fn get(&self, column: &str, stat: SummaryCol) -> Option<f64> {
        let row = self
            .df
            .column(SummaryCol::Column.as_str())
            .ok()?
            .str()
            .ok()?
            .into_iter()
            .position(|c| c == Some(column))?;
        self.df.column(stat.as_str()).ok()?.f64().ok()?.get(row)
    }
}
